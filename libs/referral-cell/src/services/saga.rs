use serde_json::{Map, Value};
use tracing::{error, info, warn};

use shared_database::{Record, RecordStore, Sheet, StoreError};

use crate::error::ReferralError;
use crate::models::{columns, SlotStatus};

/// Undo step for a write that already reached the store.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Put the given columns of row `id` back to their previous values.
    Revert { sheet: Sheet, id: String, fields: Record },
    /// Remove a row this operation created.
    Delete { sheet: Sheet, id: String },
    /// Re-insert a row this operation deleted.
    Recreate { sheet: Sheet, record: Record },
}

impl Compensation {
    pub fn release_slot(slot_id: &str) -> Self {
        Self::revert(Sheet::Slots, slot_id, columns::SLOT_STATUS, SlotStatus::Free.as_cell())
    }

    pub fn occupy_slot(slot_id: &str) -> Self {
        Self::revert(Sheet::Slots, slot_id, columns::SLOT_STATUS, SlotStatus::Occupied.as_cell())
    }

    pub fn revert(sheet: Sheet, id: &str, field: &str, value: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(field.to_string(), Value::String(value.to_string()));
        Compensation::Revert { sheet, id: id.to_string(), fields }
    }

    async fn apply(&self, store: &dyn RecordStore) -> Result<(), StoreError> {
        match self {
            Compensation::Revert { sheet, id, fields } => {
                let mut record = fields.clone();
                record.insert("id".to_string(), Value::String(id.clone()));
                store.update(*sheet, record).await
            }
            Compensation::Delete { sheet, id } => store.delete(*sheet, id).await,
            Compensation::Recreate { sheet, record } => store.create(*sheet, record.clone()).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Compensation::Revert { sheet, id, fields } => {
                let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("revert {} of {} row {}", columns.join(","), sheet, id)
            }
            Compensation::Delete { sheet, id } => format!("delete {} row {}", sheet, id),
            Compensation::Recreate { sheet, record } => format!(
                "recreate {} row {}",
                sheet,
                record.get("id").and_then(Value::as_str).unwrap_or("?")
            ),
        }
    }
}

/// Compensating log for a multi-step write.
///
/// Each completed step registers its undo; on failure [`Saga::abort`] runs them
/// newest first and hands back the error that stopped the operation.
pub struct Saga<'a> {
    store: &'a dyn RecordStore,
    operation: &'static str,
    steps: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    pub fn new(store: &'a dyn RecordStore, operation: &'static str) -> Self {
        Self {
            store,
            operation,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Undoes completed steps. Failures here are logged; the original error wins.
    pub async fn abort(self, cause: ReferralError) -> ReferralError {
        if self.steps.is_empty() {
            return cause;
        }

        warn!(
            "{} failed ({}); compensating {} step(s)",
            self.operation,
            cause,
            self.steps.len()
        );
        for step in self.steps.iter().rev() {
            match step.apply(self.store).await {
                Ok(()) => info!("{}: {}", self.operation, step.describe()),
                Err(e) => error!("{}: could not {}: {}", self.operation, step.describe(), e),
            }
        }
        cause
    }
}
