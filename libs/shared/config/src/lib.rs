use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HOSPITAL_ESTABLISHMENT_ID: &str = "000025210";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sheets_api_url: String,
    pub hospital_establishment_id: String,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub request_timeout_secs: u64,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            sheets_api_url: env::var("SHEETS_API_URL")
                .unwrap_or_else(|_| {
                    warn!("SHEETS_API_URL not set, using empty value");
                    String::new()
                }),
            hospital_establishment_id: env::var("HOSPITAL_ESTABLISHMENT_ID")
                .unwrap_or_else(|_| {
                    warn!("HOSPITAL_ESTABLISHMENT_ID not set, using default");
                    DEFAULT_HOSPITAL_ESTABLISHMENT_ID.to_string()
                }),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SESSION_SECRET not set, using empty value");
                    String::new()
                }),
            session_ttl_hours: parse_or_default("SESSION_TTL_HOURS", 12),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 15),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.is_remote_store_configured() && !self.session_secret.is_empty()
    }

    /// False means the service runs on the in-memory store.
    pub fn is_remote_store_configured(&self) -> bool {
        !self.sheets_api_url.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
