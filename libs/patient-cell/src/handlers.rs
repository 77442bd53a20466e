use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::{error::AppError, Session};

use crate::models::{IdentifyPatientRequest, PatientError};
use crate::services::PatientService;

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound(_) => AppError::NotFound(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Store(store) => store.into(),
        }
    }
}

#[axum::debug_handler]
pub async fn identify_patient(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<IdentifyPatientRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!("Patient identification requested by {}", session.user_id);
    let service = PatientService::new(state.store.clone());

    let identification = service.find_or_create(request).await?;

    Ok(Json(json!(identification)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<Session>,
    Path(national_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(state.store.clone());

    let patient = service.get_by_national_id(&national_id).await?;

    Ok(Json(json!(patient)))
}
