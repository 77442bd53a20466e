use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::store::{cell_equals, record_id, Record, RecordStore, Sheet, StoreError, StoreOp};

/// In-process [`RecordStore`] with the same row semantics as the remote sheet.
///
/// Rows keep insertion order. Used when no remote endpoint is configured and
/// by tests, which can queue one-shot failures with [`MemoryStore::fail_next`].
#[derive(Default)]
pub struct MemoryStore {
    sheets: RwLock<HashMap<Sheet, Vec<Record>>>,
    injected: Mutex<Vec<(StoreOp, Sheet, StoreError)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, sheet: Sheet, rows: Vec<Value>) {
        let mut sheets = self.sheets.write().await;
        let table = sheets.entry(sheet).or_default();
        table.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(record) => Some(record),
            _ => None,
        }));
    }

    /// Snapshot of a sheet's rows.
    pub async fn rows(&self, sheet: Sheet) -> Vec<Record> {
        self.sheets
            .read()
            .await
            .get(&sheet)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn row(&self, sheet: Sheet, id: &str) -> Option<Record> {
        self.rows(sheet)
            .await
            .into_iter()
            .find(|row| record_id(row).as_deref() == Some(id))
    }

    /// The next `op` on `sheet` fails with `error` instead of running.
    pub async fn fail_next(&self, op: StoreOp, sheet: Sheet, error: StoreError) {
        self.injected.lock().await.push((op, sheet, error));
    }

    async fn take_injected(&self, op: StoreOp, sheet: Sheet) -> Result<(), StoreError> {
        let mut injected = self.injected.lock().await;
        if let Some(pos) = injected.iter().position(|(o, s, _)| *o == op && *s == sheet) {
            let (_, _, error) = injected.remove(pos);
            warn!("Injected failure on {} '{}': {}", op, sheet, error);
            return Err(error);
        }
        Ok(())
    }

    fn merge(target: &mut Record, patch: Record) {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, sheet: Sheet) -> Result<Vec<Record>, StoreError> {
        self.take_injected(StoreOp::Read, sheet).await?;
        Ok(self.rows(sheet).await)
    }

    async fn create(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        self.take_injected(StoreOp::Create, sheet).await?;
        debug!("Memory create on '{}'", sheet);
        self.sheets.write().await.entry(sheet).or_default().push(record);
        Ok(())
    }

    async fn update(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        self.take_injected(StoreOp::Update, sheet).await?;
        let id = record_id(&record).ok_or_else(|| {
            StoreError::StoreUnavailable(format!("update {} without id", sheet))
        })?;

        let mut sheets = self.sheets.write().await;
        let row = sheets
            .get_mut(&sheet)
            .and_then(|rows| rows.iter_mut().find(|row| record_id(row).as_deref() == Some(id.as_str())))
            .ok_or_else(|| StoreError::StoreUnavailable(format!("{} row {} not found", sheet, id)))?;
        Self::merge(row, record);
        Ok(())
    }

    async fn delete(&self, sheet: Sheet, id: &str) -> Result<(), StoreError> {
        self.take_injected(StoreOp::Delete, sheet).await?;
        if let Some(rows) = self.sheets.write().await.get_mut(&sheet) {
            rows.retain(|row| record_id(row).as_deref() != Some(id));
        }
        Ok(())
    }

    async fn compare_and_update(
        &self,
        sheet: Sheet,
        id: &str,
        field: &str,
        expected: &str,
        record: Record,
    ) -> Result<bool, StoreError> {
        self.take_injected(StoreOp::Update, sheet).await?;

        let mut sheets = self.sheets.write().await;
        let row = sheets
            .get_mut(&sheet)
            .and_then(|rows| rows.iter_mut().find(|row| record_id(row).as_deref() == Some(id)))
            .ok_or_else(|| StoreError::StoreUnavailable(format!("{} row {} not found", sheet, id)))?;

        if !cell_equals(row, field, expected) {
            return Ok(false);
        }
        Self::merge(row, record);
        Ok(true)
    }
}
