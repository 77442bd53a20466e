use std::sync::Arc;

use serde_json::{json, Value};

use shared_config::{AppConfig, DEFAULT_HOSPITAL_ESTABLISHMENT_ID};
use shared_database::{AppState, MemoryStore, RecordStore, Sheet};
use shared_models::session::{Role, Session};

use crate::jwt::issue_session_token;

pub const TEST_ESTABLISHMENT_ID: &str = "000001001";

pub struct TestConfig {
    pub session_secret: String,
    pub sheets_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            session_secret: "test-secret-key-for-session-tokens".to_string(),
            sheets_api_url: String::new(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            sheets_api_url: self.sheets_api_url.clone(),
            hospital_establishment_id: DEFAULT_HOSPITAL_ESTABLISHMENT_ID.to_string(),
            session_secret: self.session_secret.clone(),
            session_ttl_hours: 1,
            request_timeout_secs: 2,
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    /// Router state backed by the given memory store.
    pub fn to_state(&self, store: Arc<MemoryStore>) -> Arc<AppState> {
        let store: Arc<dyn RecordStore> = store;
        Arc::new(AppState::new(self.to_app_config(), store))
    }
}

pub struct TestSession;

impl TestSession {
    pub fn hospital() -> Session {
        Session {
            user_id: "USU-HOSP".to_string(),
            name: "Rosa Quispe".to_string(),
            email: "rosa@hospital.pe".to_string(),
            establishment_id: DEFAULT_HOSPITAL_ESTABLISHMENT_ID.to_string(),
            establishment_name: Some("Hospital Tupac Amaru".to_string()),
            role: Role::Hospital,
        }
    }

    pub fn establishment() -> Session {
        Self::establishment_with_id(TEST_ESTABLISHMENT_ID)
    }

    pub fn establishment_with_id(establishment_id: &str) -> Session {
        Session {
            user_id: format!("USU-{}", establishment_id),
            name: "Ana Pérez".to_string(),
            email: "ana@eess.pe".to_string(),
            establishment_id: establishment_id.to_string(),
            establishment_name: Some("C.S. San Martín".to_string()),
            role: Role::Establishment,
        }
    }

    pub fn bearer(session: &Session, config: &TestConfig) -> String {
        let token = issue_session_token(session, &config.session_secret, 1)
            .expect("test secret is set");
        format!("Bearer {}", token)
    }
}

/// Rows shaped like the remote workbook.
pub struct SheetFixtures;

impl SheetFixtures {
    pub fn slot(id: &str, fecha: &str, hora: &str, estado: &str) -> Value {
        json!({ "id": id, "fecha": fecha, "hora": hora, "estado": estado })
    }

    pub fn establishment(id: &str, nombre: &str) -> Value {
        json!({ "id": id, "nombre": nombre })
    }

    pub fn user(id: &str, correo: &str, dni: &str, establecimiento_id: &str) -> Value {
        json!({
            "id": id,
            "nombre_completo": "Usuario de Prueba",
            "correo": correo,
            "dni": dni,
            "establecimiento_id": establecimiento_id
        })
    }

    pub fn specialty(id: &str, nombre: &str) -> Value {
        json!({ "id": id, "nombre": nombre })
    }

    pub fn patient(id: &str, dni: &str, nombres: &str) -> Value {
        json!({ "id": id, "dni": dni, "nombres": nombres, "telefono": "987654321" })
    }

    /// Two free slots (`S1`, `S2`), one taken slot (`S3`), two establishments
    /// and a specialty catalogue.
    pub async fn seed_default(store: &MemoryStore) {
        store
            .seed(
                Sheet::Slots,
                vec![
                    Self::slot("S1", "2024-05-10", "09:00", "libre"),
                    Self::slot("S2", "2024-06-14", "10:30", "libre"),
                    Self::slot("S3", "2024-05-10", "08:00", "copado"),
                ],
            )
            .await;
        store
            .seed(
                Sheet::Establishments,
                vec![
                    Self::establishment("1001", "C.S. San Martín"),
                    Self::establishment("1002", "P.S. Santa Rosa"),
                    Self::establishment(DEFAULT_HOSPITAL_ESTABLISHMENT_ID, "Hospital Tupac Amaru"),
                ],
            )
            .await;
        store
            .seed(
                Sheet::Specialties,
                vec![
                    Self::specialty("ESP-CARD", "CARDIOLOGY"),
                    Self::specialty("ESP-OBST", "OBSTETRICIA"),
                ],
            )
            .await;
    }
}
