use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_database::AppState;
use shared_utils::extractor::session_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login));

    let protected_routes = Router::new()
        .route("/session", get(handlers::current_session))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
