use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::{cells, Session};

/// A row of the `usuarios` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(rename = "nombre_completo", with = "cells::text")]
    pub full_name: String,
    #[serde(rename = "correo", with = "cells::text")]
    pub email: String,
    #[serde(rename = "dni", with = "cells::text")]
    pub national_id: String,
    #[serde(rename = "establecimiento_id", with = "cells::text")]
    pub establishment_id: String,
}

impl User {
    pub fn matches_credentials(&self, email: &str, national_id: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
            && self.national_id.trim() == national_id.trim()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub national_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session: Session,
    pub token: String,
    pub display_label: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or national ID")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
