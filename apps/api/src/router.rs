use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use auth_cell::router::auth_routes;
use catalog_cell::router::catalog_routes;
use patient_cell::router::patient_routes;
use referral_cell::router::referral_routes;
use reporting_cell::router::reporting_routes;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Prenatal referral API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/referrals", referral_routes(state.clone()))
        .nest("/reports", reporting_routes(state.clone()))
        .nest("/catalog", catalog_routes(state))
}
