use std::sync::Arc;

use shared_database::{typed, RecordStore, Sheet};
use shared_models::Establishment;

use crate::models::CatalogError;

pub struct EstablishmentService {
    store: Arc<dyn RecordStore>,
}

impl EstablishmentService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Establishments in sheet order.
    pub async fn list(&self) -> Result<Vec<Establishment>, CatalogError> {
        Ok(typed::fetch_all(self.store.as_ref(), Sheet::Establishments).await?)
    }
}
