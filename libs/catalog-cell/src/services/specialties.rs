use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use shared_database::{typed, RecordStore, Sheet};
use shared_utils::ids::{self, new_id};

use crate::models::{CatalogError, Specialty};

pub struct SpecialtyService {
    store: Arc<dyn RecordStore>,
}

impl SpecialtyService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Specialty>, CatalogError> {
        let mut specialties: Vec<Specialty> =
            typed::fetch_all(self.store.as_ref(), Sheet::Specialties).await?;
        specialties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specialties)
    }

    /// Looks a specialty up by id or by name.
    pub async fn resolve(&self, key: &str) -> Result<Option<Specialty>, CatalogError> {
        Ok(self.list().await?.into_iter().find(|s| s.matches(key)))
    }

    pub async fn create(&self, name: &str) -> Result<Specialty, CatalogError> {
        let name = name.trim().to_uppercase();
        if name.is_empty() {
            return Err(CatalogError::ValidationError("Specialty name is required".to_string()));
        }

        if self.list().await?.iter().any(|s| s.name == name) {
            return Err(CatalogError::ValidationError(format!(
                "Specialty {} already exists",
                name
            )));
        }

        let specialty = Specialty { id: new_id(ids::SPECIALTY), name };
        typed::insert(self.store.as_ref(), Sheet::Specialties, &specialty).await?;

        info!("Created specialty {} ({})", specialty.name, specialty.id);
        Ok(specialty)
    }

    /// Deletes a specialty that no specialist referral points at.
    pub async fn delete(&self, specialty_id: &str) -> Result<(), CatalogError> {
        debug!("Deleting specialty {}", specialty_id);
        let store = self.store.as_ref();
        let (specialties, referrals) = futures::try_join!(
            typed::fetch_all::<Specialty>(store, Sheet::Specialties),
            store.read(Sheet::SpecialistReferrals),
        )?;

        if !specialties.iter().any(|s| s.id == specialty_id) {
            return Err(CatalogError::NotFound(format!("Specialty {}", specialty_id)));
        }

        let in_use = referrals.iter().any(|row| {
            row.get("especialidad_id").and_then(Value::as_str).map(str::trim) == Some(specialty_id)
        });
        if in_use {
            warn!("Refusing to delete specialty {} in use", specialty_id);
            return Err(CatalogError::InUse(format!("Specialty {}", specialty_id)));
        }

        store.delete(Sheet::Specialties, specialty_id).await?;
        info!("Deleted specialty {}", specialty_id);
        Ok(())
    }
}
