use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::store::{record_id, Record, RecordStore, Sheet, StoreError};

/// Reads a sheet and decodes every non-blank row into `T`.
///
/// Rows without an `id` are spreadsheet filler and are skipped; any other row
/// that does not decode fails the whole read.
pub async fn fetch_all<T>(store: &dyn RecordStore, sheet: Sheet) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
{
    let rows = store.read(sheet).await?;
    rows.into_iter()
        .filter(|row| record_id(row).is_some())
        .map(|row| decode(sheet, row))
        .collect()
}

pub async fn fetch_one<T>(
    store: &dyn RecordStore,
    sheet: Sheet,
    id: &str,
) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
{
    let rows = store.read(sheet).await?;
    rows.into_iter()
        .find(|row| record_id(row).as_deref() == Some(id))
        .map(|row| decode(sheet, row))
        .transpose()
}

pub fn decode<T: DeserializeOwned>(sheet: Sheet, row: Record) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Schema {
        sheet,
        message: e.to_string(),
    })
}

pub fn encode<T: Serialize>(sheet: Sheet, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(StoreError::Schema {
            sheet,
            message: format!("row must encode to an object, got {}", other),
        }),
        Err(e) => Err(StoreError::Schema {
            sheet,
            message: e.to_string(),
        }),
    }
}

pub async fn insert<T: Serialize>(
    store: &dyn RecordStore,
    sheet: Sheet,
    value: &T,
) -> Result<(), StoreError> {
    store.create(sheet, encode(sheet, value)?).await
}

/// Partial update of row `id` with the given columns.
pub async fn patch(
    store: &dyn RecordStore,
    sheet: Sheet,
    id: &str,
    fields: Value,
) -> Result<(), StoreError> {
    let mut record = match fields {
        Value::Object(record) => record,
        other => {
            return Err(StoreError::Schema {
                sheet,
                message: format!("patch must be an object, got {}", other),
            })
        }
    };
    record.insert("id".to_string(), Value::String(id.to_string()));
    store.update(sheet, record).await
}
