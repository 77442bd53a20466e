use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};

use shared_database::AppState;
use shared_models::{error::AppError, Role, Session};

use crate::models::{ReportingError, Summary, SummaryQuery};
use crate::services::ReportingService;

impl From<ReportingError> for AppError {
    fn from(err: ReportingError) -> Self {
        match err {
            ReportingError::ValidationError(msg) => AppError::ValidationError(msg),
            ReportingError::Store(store) => store.into(),
        }
    }
}

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Summary>, AppError> {
    session.require_role(Role::Hospital)?;
    let period = query.period()?;

    let summary = ReportingService::new(state.store.clone()).summarize(period).await?;

    Ok(Json(summary))
}
