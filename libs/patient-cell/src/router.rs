use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_database::AppState;
use shared_utils::extractor::session_middleware;

use crate::handlers::*;

pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/identify", post(identify_patient))
        .route("/{national_id}", get(get_patient))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .with_state(state)
}
