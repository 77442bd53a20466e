use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client, Response,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::store::{cell_equals, record_id, Record, RecordStore, Sheet, StoreError, StoreOp};

/// Client for the spreadsheet web-app endpoint.
///
/// Reads are `GET ?action=read&sheet=<name>`; writes are a JSON `POST` of
/// `{"action", "sheet", "payload"}`. The endpoint has no conditional writes,
/// so [`RecordStore::compare_and_update`] is serialised in-process.
pub struct SheetsClient {
    client: Client,
    base_url: String,
    write_lock: Mutex<()>,
}

impl SheetsClient {
    pub fn new(config: &AppConfig) -> Result<Self, StoreError> {
        if config.sheets_api_url.is_empty() {
            return Err(StoreError::StoreUnavailable(
                "SHEETS_API_URL is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(Self::default_headers())
            .build()
            .map_err(|e| StoreError::StoreUnavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.sheets_api_url.clone(),
            write_lock: Mutex::new(()),
        })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(op: StoreOp, sheet: Sheet, e: reqwest::Error) -> StoreError {
        error!("Sheet {} on '{}' failed: {}", op, sheet, e);
        if e.is_timeout() || e.is_connect() || e.is_request() {
            StoreError::NetworkUnavailable(format!("{} {}: {}", op, sheet, e))
        } else {
            StoreError::StoreUnavailable(format!("{} {}: {}", op, sheet, e))
        }
    }

    async fn read_body(op: StoreOp, sheet: Sheet, response: Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::transport_error(op, sheet, e))?;

        if !status.is_success() {
            error!("Sheet API error ({}) on {} '{}': {}", status, op, sheet, body);
            return Err(StoreError::StoreUnavailable(format!(
                "{} {} answered {}",
                op, sheet, status
            )));
        }

        Ok(body)
    }

    async fn write(&self, op: StoreOp, sheet: Sheet, payload: Value) -> Result<(), StoreError> {
        debug!("Sheet {} on '{}'", op, sheet);

        let body = json!({
            "action": op.to_string(),
            "sheet": sheet.name(),
            "payload": payload,
        });

        let response = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport_error(op, sheet, e))?;

        let text = Self::read_body(op, sheet, response).await?;
        if text.trim().is_empty() {
            return Ok(());
        }

        // Non-JSON acknowledgements are accepted; only an explicit refusal fails.
        if let Ok(Value::Object(ack)) = serde_json::from_str::<Value>(&text) {
            if ack.get("success") == Some(&Value::Bool(false)) {
                let message = ack
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("operation refused")
                    .to_string();
                warn!("Sheet {} on '{}' refused: {}", op, sheet, message);
                return Err(StoreError::StoreUnavailable(message));
            }
        }

        Ok(())
    }

    fn parse_rows(sheet: Sheet, text: &str) -> Result<Vec<Record>, StoreError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            StoreError::StoreUnavailable(format!("read {}: invalid JSON: {}", sheet, e))
        })?;

        let rows = match value {
            Value::Array(rows) => rows,
            Value::Object(mut envelope) => {
                if envelope.get("success") == Some(&Value::Bool(false)) {
                    let message = envelope
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("read refused")
                        .to_string();
                    return Err(StoreError::StoreUnavailable(message));
                }
                match envelope.remove("data") {
                    Some(Value::Array(rows)) => rows,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(StoreError::StoreUnavailable(format!(
                            "read {}: unexpected data payload {}",
                            sheet, other
                        )))
                    }
                }
            }
            other => {
                return Err(StoreError::StoreUnavailable(format!(
                    "read {}: unexpected response {}",
                    sheet, other
                )))
            }
        };

        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl RecordStore for SheetsClient {
    async fn read(&self, sheet: Sheet) -> Result<Vec<Record>, StoreError> {
        debug!("Reading sheet '{}'", sheet);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("action", "read"), ("sheet", sheet.name())])
            .send()
            .await
            .map_err(|e| Self::transport_error(StoreOp::Read, sheet, e))?;

        let text = Self::read_body(StoreOp::Read, sheet, response).await?;
        Self::parse_rows(sheet, &text)
    }

    async fn create(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        self.write(StoreOp::Create, sheet, Value::Object(record)).await
    }

    async fn update(&self, sheet: Sheet, record: Record) -> Result<(), StoreError> {
        if record_id(&record).is_none() {
            return Err(StoreError::StoreUnavailable(format!(
                "update {} without id",
                sheet
            )));
        }
        self.write(StoreOp::Update, sheet, Value::Object(record)).await
    }

    async fn delete(&self, sheet: Sheet, id: &str) -> Result<(), StoreError> {
        self.write(StoreOp::Delete, sheet, json!({ "id": id })).await
    }

    async fn compare_and_update(
        &self,
        sheet: Sheet,
        id: &str,
        field: &str,
        expected: &str,
        mut record: Record,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let rows = self.read(sheet).await?;
        let current = rows
            .iter()
            .find(|row| record_id(row).as_deref() == Some(id))
            .ok_or_else(|| StoreError::StoreUnavailable(format!("{} row {} not found", sheet, id)))?;

        if !cell_equals(current, field, expected) {
            debug!("Conditional update on {} {} skipped: {} != {}", sheet, id, field, expected);
            return Ok(false);
        }

        record.insert("id".to_string(), Value::String(id.to_string()));
        self.update(sheet, record).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(url: &str) -> AppConfig {
        AppConfig {
            sheets_api_url: url.to_string(),
            hospital_establishment_id: "000025210".to_string(),
            session_secret: "test".to_string(),
            session_ttl_hours: 1,
            request_timeout_secs: 1,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn test_client_creation_fails_without_url() {
        let result = SheetsClient::new(&create_test_config(""));
        assert!(matches!(result, Err(StoreError::StoreUnavailable(_))));
    }

    #[test]
    fn test_parse_rows_envelopes() {
        let wrapped = SheetsClient::parse_rows(Sheet::Slots, r#"{"data":[{"id":"S1"},3]}"#).unwrap();
        assert_eq!(wrapped.len(), 1);

        let bare = SheetsClient::parse_rows(Sheet::Slots, r#"[{"id":"S1"},{"id":"S2"}]"#).unwrap();
        assert_eq!(bare.len(), 2);

        let refused = SheetsClient::parse_rows(Sheet::Slots, r#"{"success":false,"message":"quota"}"#);
        assert_eq!(refused, Err(StoreError::StoreUnavailable("quota".to_string())));

        assert!(SheetsClient::parse_rows(Sheet::Slots, "<html>").is_err());
    }
}
