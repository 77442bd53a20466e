use thiserror::Error;

use catalog_cell::models::CatalogError;
use patient_cell::models::PatientError;
use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("Slot {0} is not available")]
    SlotUnavailable(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PatientError> for ReferralError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(id) => ReferralError::NotFound(format!("Patient {}", id)),
            PatientError::ValidationError(msg) => ReferralError::ValidationError(msg),
            PatientError::Store(store) => ReferralError::Store(store),
        }
    }
}

impl From<CatalogError> for ReferralError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => ReferralError::NotFound(what),
            CatalogError::ValidationError(msg) => ReferralError::ValidationError(msg),
            CatalogError::InUse(what) => ReferralError::InvalidTransition(format!("{} is in use", what)),
            CatalogError::Store(store) => ReferralError::Store(store),
        }
    }
}

impl From<ReferralError> for AppError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::SlotUnavailable(_) | ReferralError::InvalidTransition(_) => {
                AppError::Conflict(err.to_string())
            }
            ReferralError::ValidationError(msg) => AppError::ValidationError(msg),
            ReferralError::NotFound(_) => AppError::NotFound(err.to_string()),
            ReferralError::Forbidden(msg) => AppError::Forbidden(msg),
            ReferralError::Store(store) => store.into(),
        }
    }
}
