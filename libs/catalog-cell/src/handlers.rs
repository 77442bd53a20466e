use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::{error::AppError, Role, Session};

use crate::models::{CatalogError, CreateSpecialtyRequest, CreateUserRequest};
use crate::services::{EstablishmentService, SpecialtyService, UserService};

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => AppError::NotFound(err.to_string()),
            CatalogError::ValidationError(msg) => AppError::ValidationError(msg),
            CatalogError::InUse(_) => AppError::Conflict(err.to_string()),
            CatalogError::Store(store) => store.into(),
        }
    }
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let specialties = SpecialtyService::new(state.store.clone()).list().await?;

    Ok(Json(json!({
        "specialties": specialties,
        "total": specialties.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_specialty(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateSpecialtyRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    session.require_role(Role::Hospital)?;
    let specialty = SpecialtyService::new(state.store.clone()).create(&request.name).await?;

    Ok((StatusCode::CREATED, Json(json!(specialty))))
}

#[axum::debug_handler]
pub async fn delete_specialty(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(specialty_id): Path<String>,
) -> Result<StatusCode, AppError> {
    session.require_role(Role::Hospital)?;
    SpecialtyService::new(state.store.clone()).delete(&specialty_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let users = UserService::new(state.store.clone()).list().await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    session.require_role(Role::Hospital)?;
    let user = UserService::new(state.store.clone()).create(request).await?;

    Ok((StatusCode::CREATED, Json(json!(user))))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    session.require_role(Role::Hospital)?;
    UserService::new(state.store.clone()).delete(&user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_establishments(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let establishments = EstablishmentService::new(state.store.clone()).list().await?;

    Ok(Json(json!({
        "establishments": establishments,
        "total": establishments.len(),
    })))
}
