use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use shared_database::{typed, RecordStore, Sheet};
use shared_utils::ids::{self, new_id};

use crate::models::{IdentifyPatientRequest, Patient, PatientError, PatientIdentification};

/// DNI (8 digits) or foreigner's card (up to 12 alphanumerics).
static NATIONAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z]{8,12}$").unwrap());

pub fn validate_national_id(national_id: &str) -> Result<(), PatientError> {
    if NATIONAL_ID.is_match(national_id.trim()) {
        Ok(())
    } else {
        Err(PatientError::ValidationError(format!(
            "National ID '{}' must be 8 to 12 letters or digits",
            national_id.trim()
        )))
    }
}

pub struct PatientService {
    store: Arc<dyn RecordStore>,
}

impl PatientService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Patient>, PatientError> {
        Ok(typed::fetch_all(self.store.as_ref(), Sheet::Patients).await?)
    }

    pub async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Patient>, PatientError> {
        let national_id = national_id.trim();
        validate_national_id(national_id)?;

        debug!("Looking up patient by national ID {}", national_id);
        let patients = self.list().await?;
        Ok(patients.into_iter().find(|p| p.national_id == national_id))
    }

    pub async fn get_by_national_id(&self, national_id: &str) -> Result<Patient, PatientError> {
        self.find_by_national_id(national_id)
            .await?
            .ok_or_else(|| PatientError::NotFound(national_id.trim().to_string()))
    }

    /// Returns the patient with this national ID, registering it first when absent.
    /// An existing patient keeps its stored name and phone.
    pub async fn find_or_create(
        &self,
        request: IdentifyPatientRequest,
    ) -> Result<PatientIdentification, PatientError> {
        let national_id = request.national_id.trim().to_string();
        validate_national_id(&national_id)?;

        if let Some(patient) = self.find_by_national_id(&national_id).await? {
            return Ok(PatientIdentification { patient, created: false });
        }

        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(PatientError::ValidationError("Patient name is required".to_string()));
        }

        let patient = Patient {
            id: new_id(ids::PATIENT),
            national_id,
            full_name: full_name.to_string(),
            phone: request.phone.trim().to_string(),
        };
        typed::insert(self.store.as_ref(), Sheet::Patients, &patient).await?;

        info!("Registered patient {} ({})", patient.id, patient.national_id);
        Ok(PatientIdentification { patient, created: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_database::MemoryStore;

    fn request(national_id: &str) -> IdentifyPatientRequest {
        IdentifyPatientRequest {
            national_id: national_id.to_string(),
            full_name: "María Huamán".to_string(),
            phone: "987654321".to_string(),
        }
    }

    #[test]
    fn test_validate_national_id() {
        assert!(validate_national_id("42327868").is_ok());
        assert!(validate_national_id(" 42327868 ").is_ok());
        assert!(validate_national_id("CE0012345678").is_ok());
        assert_matches!(validate_national_id("1234"), Err(PatientError::ValidationError(_)));
        assert_matches!(validate_national_id("4232-7868"), Err(PatientError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_find_or_create_registers_once() {
        let store = Arc::new(MemoryStore::new());
        let service = PatientService::new(store.clone());

        let first = service.find_or_create(request("42327868")).await.unwrap();
        assert!(first.created);
        assert!(first.patient.id.starts_with("G-"));

        let second = service.find_or_create(request("42327868")).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.patient.id, first.patient.id);
        assert_eq!(store.rows(Sheet::Patients).await.len(), 1);
    }

    #[tokio::test]
    async fn test_numeric_national_id_cells_match() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                Sheet::Patients,
                vec![json!({"id": "G-1", "dni": 42327868, "nombres": "María", "telefono": 987654321})],
            )
            .await;
        let service = PatientService::new(store);

        let patient = service.get_by_national_id("42327868").await.unwrap();
        assert_eq!(patient.id, "G-1");
        assert_eq!(patient.phone, "987654321");
    }

    #[tokio::test]
    async fn test_missing_name_is_rejected() {
        let service = PatientService::new(Arc::new(MemoryStore::new()));
        let mut req = request("42327868");
        req.full_name = "  ".to_string();

        assert_matches!(service.find_or_create(req).await, Err(PatientError::ValidationError(_)));
    }
}
