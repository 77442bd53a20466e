use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::session_middleware;

use crate::handlers::*;

pub fn referral_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Slots
        .route("/slots/free", get(list_free_slots))
        .route("/slots", get(list_slots).post(create_slot))
        .route("/slots/{slot_id}", delete(delete_slot))
        // Referrals
        .route("/", post(create_referral))
        .route("/inbox", get(hospital_inbox))
        .route("/history", get(establishment_history))
        .route("/{referral_id}", get(get_referral).delete(cancel_referral))
        // Appointments
        .route("/appointments/{appointment_id}/outcome", post(record_outcome))
        .route("/appointments/{appointment_id}/reschedule", patch(reschedule_appointment))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .with_state(state)
}
