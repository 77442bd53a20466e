use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
};
use serde_json::{json, Value};
use tracing::debug;

use shared_database::AppState;
use shared_models::{error::AppError, Session};
use shared_utils::jwt::issue_session_token;

use crate::models::{AuthError, LoginRequest, LoginResponse};
use crate::services::LoginService;

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::Store(store) => store.into(),
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let service = LoginService::new(state.store.clone(), &state.config.hospital_establishment_id);
    let session = service.login(&request).await?;

    let token = issue_session_token(
        &session,
        &state.config.session_secret,
        state.config.session_ttl_hours,
    )
    .map_err(AppError::Internal)?;

    Ok(Json(LoginResponse {
        display_label: session.display_label(),
        session,
        token,
    }))
}

pub async fn current_session(
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    debug!("Session lookup for user: {}", session.user_id);

    Ok(Json(json!({
        "display_label": session.display_label(),
        "session": session,
    })))
}
