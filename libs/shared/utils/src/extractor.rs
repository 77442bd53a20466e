use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use shared_database::AppState;
use shared_models::error::AppError;

use crate::jwt::validate_session_token;

/// Validates the bearer session token and stores the `Session` in the
/// request extensions.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(auth) =
        auth.ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let session = validate_session_token(auth.token(), &state.config.session_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
