use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use shared_models::error::AppError;

/// A sheet row: column name to cell value.
pub type Record = Map<String, Value>;

/// Sheets of the remote workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Patients,
    Referrals,
    Slots,
    Appointments,
    Visits,
    Specialties,
    SpecialistReferrals,
    Users,
    Establishments,
}

impl Sheet {
    pub const ALL: [Sheet; 9] = [
        Sheet::Patients,
        Sheet::Referrals,
        Sheet::Slots,
        Sheet::Appointments,
        Sheet::Visits,
        Sheet::Specialties,
        Sheet::SpecialistReferrals,
        Sheet::Users,
        Sheet::Establishments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sheet::Patients => "gestantes",
            Sheet::Referrals => "referencias",
            Sheet::Slots => "horario",
            Sheet::Appointments => "citas",
            Sheet::Visits => "atenciones",
            Sheet::Specialties => "especialidades",
            Sheet::SpecialistReferrals => "derivaciones",
            Sheet::Users => "usuarios",
            Sheet::Establishments => "establecimientos",
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOp::Read => write!(f, "read"),
            StoreOp::Create => write!(f, "create"),
            StoreOp::Update => write!(f, "update"),
            StoreOp::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The store could not be reached: connection refused, DNS, timeout.
    #[error("Record store unreachable: {0}")]
    NetworkUnavailable(String),

    /// The store answered but refused or garbled the operation.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed row in sheet '{sheet}': {message}")]
    Schema { sheet: Sheet, message: String },
}

impl StoreError {
    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::NetworkUnavailable(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NetworkUnavailable(_) => AppError::ServiceUnavailable(err.to_string()),
            StoreError::StoreUnavailable(_) | StoreError::Schema { .. } => {
                AppError::ExternalService(err.to_string())
            }
        }
    }
}

/// Read/create/update/delete against named sheets.
///
/// `update` is a partial write: the record must carry `id`, and only the
/// columns present are changed. There is no row-level conflict detection
/// except through [`RecordStore::compare_and_update`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read(&self, sheet: Sheet) -> Result<Vec<Record>, StoreError>;

    async fn create(&self, sheet: Sheet, record: Record) -> Result<(), StoreError>;

    async fn update(&self, sheet: Sheet, record: Record) -> Result<(), StoreError>;

    async fn delete(&self, sheet: Sheet, id: &str) -> Result<(), StoreError>;

    /// Applies `record` to row `id` only if column `field` currently equals
    /// `expected`. Returns `Ok(false)` without writing when it does not, and
    /// `StoreUnavailable` when the row does not exist.
    async fn compare_and_update(
        &self,
        sheet: Sheet,
        id: &str,
        field: &str,
        expected: &str,
        record: Record,
    ) -> Result<bool, StoreError>;
}

pub(crate) fn record_id(record: &Record) -> Option<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn cell_equals(record: &Record, field: &str, expected: &str) -> bool {
    match record.get(field) {
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case(expected),
        Some(Value::Number(n)) => n.to_string() == expected,
        Some(Value::Bool(b)) => b.to_string().eq_ignore_ascii_case(expected),
        Some(Value::Null) | None => expected.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_sheet_names_are_unique() {
        let mut names: Vec<_> = Sheet::ALL.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Sheet::ALL.len());
    }

    #[test]
    fn test_record_id() {
        assert_eq!(record_id(&rec(json!({"id": "SLOT-1"}))), Some("SLOT-1".to_string()));
        assert_eq!(record_id(&rec(json!({"id": 25210}))), Some("25210".to_string()));
        assert_eq!(record_id(&rec(json!({"id": "  "}))), None);
        assert_eq!(record_id(&rec(json!({"nombre": "x"}))), None);
    }

    #[test]
    fn test_cell_equals() {
        let row = rec(json!({"estado": "libre", "n": 3}));
        assert!(cell_equals(&row, "estado", "libre"));
        assert!(!cell_equals(&row, "estado", "copado"));
        assert!(cell_equals(&row, "estado", "LIBRE"));
        assert!(cell_equals(&row, "n", "3"));
        assert!(cell_equals(&row, "missing", ""));
    }

    #[test]
    fn test_store_errors_map_to_gateway_statuses() {
        use axum::http::StatusCode;

        let network: AppError = StoreError::NetworkUnavailable("timeout".into()).into();
        assert_eq!(network.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let schema: AppError = StoreError::Schema { sheet: Sheet::Slots, message: "bad".into() }.into();
        assert_eq!(schema.status_code(), StatusCode::BAD_GATEWAY);
    }
}
