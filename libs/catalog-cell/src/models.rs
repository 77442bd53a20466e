use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::cells;

/// A row of the `especialidades` sheet. Names are stored upper-case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Specialty {
    pub id: String,
    #[serde(rename = "nombre", with = "cells::text")]
    pub name: String,
}

impl Specialty {
    /// True when `key` is this specialty's id or, ignoring case, its name.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.id == key || self.name.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: String,
    pub national_id: String,
    pub establishment_id: String,
}

/// A user together with the name of their establishment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub national_id: String,
    pub establishment_id: String,
    pub establishment_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} is still referenced")]
    InUse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
