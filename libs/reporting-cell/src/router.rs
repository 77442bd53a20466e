use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_database::AppState;
use shared_utils::extractor::session_middleware;

use crate::handlers::*;

pub fn reporting_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/summary", get(get_summary))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .with_state(state)
}
