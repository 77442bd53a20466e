use std::sync::Arc;
use axum::{middleware, routing::{delete, get}, Router};
use shared_database::AppState;
use shared_utils::extractor::session_middleware;

use crate::handlers::*;

pub fn catalog_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/specialties", get(list_specialties).post(create_specialty))
        .route("/specialties/{specialty_id}", delete(delete_specialty))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{user_id}", delete(delete_user))
        .route("/establishments", get(list_establishments))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .with_state(state)
}
