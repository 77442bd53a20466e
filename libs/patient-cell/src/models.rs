use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::cells;

/// A row of the `gestantes` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    pub id: String,
    /// National ID, the natural key of the sheet.
    #[serde(rename = "dni", with = "cells::text")]
    pub national_id: String,
    #[serde(rename = "nombres", with = "cells::text")]
    pub full_name: String,
    #[serde(rename = "telefono", with = "cells::text", default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPatientRequest {
    pub national_id: String,
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientIdentification {
    pub patient: Patient,
    /// False when a patient with the same national ID already existed.
    pub created: bool,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
