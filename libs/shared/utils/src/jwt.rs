use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use shared_models::session::{Session, SessionClaims};

type HmacSha256 = Hmac<Sha256>;

fn sign(signing_input: &str, secret: &str) -> Result<Vec<u8>, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Issues an HS256 token carrying the session.
pub fn issue_session_token(session: &Session, secret: &str, ttl_hours: i64) -> Result<String, String> {
    if secret.is_empty() {
        return Err("Session secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = SessionClaims {
        sub: session.user_id.clone(),
        name: session.name.clone(),
        email: session.email.clone(),
        establishment_id: session.establishment_id.clone(),
        establishment_name: session.establishment_name.clone(),
        role: session.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims_json = serde_json::to_string(&claims).map_err(|e| e.to_string())?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let signature = sign(&signing_input, secret)?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

pub fn validate_session_token(token: &str, secret: &str) -> Result<Session, String> {
    if secret.is_empty() {
        return Err("Session secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let signature = URL_SAFE_NO_PAD.decode(parts[2]).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| "Invalid claims encoding".to_string())?;

    let claims: SessionClaims = serde_json::from_slice(&claims_bytes).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })?;

    let now = Utc::now().timestamp();
    if claims.exp < now {
        debug!("Token expired at {} (now: {})", claims.exp, now);
        return Err("Token expired".to_string());
    }

    debug!("Session token validated for user: {}", claims.sub);
    Ok(claims.into_session())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::session::Role;

    fn session() -> Session {
        Session {
            user_id: "USU-1".to_string(),
            name: "Ana Pérez".to_string(),
            email: "ana@example.com".to_string(),
            establishment_id: "000001001".to_string(),
            establishment_name: Some("C.S. Lima".to_string()),
            role: Role::Establishment,
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let token = issue_session_token(&session(), "secret", 1).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = validate_session_token(&token, "secret").unwrap();
        assert_eq!(decoded, session());
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let token = issue_session_token(&session(), "secret", 1).unwrap();
        assert_eq!(
            validate_session_token(&token, "other"),
            Err("Invalid token signature".to_string())
        );
    }

    #[test]
    fn test_rejects_expired() {
        let token = issue_session_token(&session(), "secret", -1).unwrap();
        assert_eq!(validate_session_token(&token, "secret"), Err("Token expired".to_string()));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(validate_session_token("invalid.token", "secret").is_err());
        assert!(issue_session_token(&session(), "", 1).is_err());
    }
}
