pub mod memory;
pub mod sheets;
pub mod store;
pub mod typed;

use std::sync::Arc;
use tracing::{info, warn};

use shared_config::AppConfig;

pub use memory::MemoryStore;
pub use sheets::SheetsClient;
pub use store::{Record, RecordStore, Sheet, StoreError, StoreOp};

/// Shared router state: configuration plus the record store every cell uses.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Remote sheet store when `SHEETS_API_URL` is set, in-memory otherwise.
    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn RecordStore> = if config.is_remote_store_configured() {
            info!("Using remote sheet store at {}", config.sheets_api_url);
            Arc::new(SheetsClient::new(&config)?)
        } else {
            warn!("SHEETS_API_URL not set - records are kept in memory only");
            Arc::new(MemoryStore::new())
        };
        Ok(Self::new(config, store))
    }
}
