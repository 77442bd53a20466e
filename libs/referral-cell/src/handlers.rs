use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::{error::AppError, Role, Session};

use crate::models::{CreateReferralRequest, CreateSlotRequest, RecordOutcomeRequest, RescheduleRequest};
use crate::services::{InboxService, ReferralService, SlotAllocator};

// ==============================================================================
// SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_free_slots(
    State(state): State<Arc<AppState>>,
    Extension(_session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let slots = SlotAllocator::new(state.store.clone()).list_free().await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let slots = SlotAllocator::new(state.store.clone()).list_all().await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len(),
    })))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    session.require_role(Role::Hospital)?;
    let slot = SlotAllocator::new(state.store.clone())
        .create_slot(request.date, request.time)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(slot))))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(slot_id): Path<String>,
) -> Result<StatusCode, AppError> {
    session.require_role(Role::Hospital)?;
    SlotAllocator::new(state.store.clone()).delete_slot(&slot_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// REFERRALS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_referral(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateReferralRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    session.require_role(Role::Establishment)?;
    let created = ReferralService::new(state.store.clone())
        .create_referral(&session, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn hospital_inbox(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let entries = InboxService::new(state.store.clone()).hospital_inbox().await?;

    Ok(Json(json!({
        "referrals": entries,
        "total": entries.len(),
    })))
}

#[axum::debug_handler]
pub async fn establishment_history(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Establishment)?;
    let entries = InboxService::new(state.store.clone())
        .establishment_history(&session)
        .await?;

    Ok(Json(json!({
        "referrals": entries,
        "total": entries.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_referral(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(referral_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let detail = ReferralService::new(state.store.clone())
        .get_referral(&session, &referral_id)
        .await?;

    Ok(Json(json!(detail)))
}

#[axum::debug_handler]
pub async fn cancel_referral(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(referral_id): Path<String>,
) -> Result<StatusCode, AppError> {
    ReferralService::new(state.store.clone())
        .cancel_referral(&session, &referral_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn record_outcome(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(appointment_id): Path<String>,
    Json(request): Json<RecordOutcomeRequest>,
) -> Result<Json<Value>, AppError> {
    session.require_role(Role::Hospital)?;
    let outcome = ReferralService::new(state.store.clone())
        .record_visit_outcome(&session, &appointment_id, request)
        .await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(appointment_id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = ReferralService::new(state.store.clone())
        .reschedule_appointment(&session, &appointment_id, &request.new_slot_id)
        .await?;

    Ok(Json(json!(appointment)))
}
