// Handlers module
// HTML views plus the service endpoints

pub mod posts;
pub mod users;

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::{Html, IntoResponse},
};
use tracing::{debug, error};

use crate::{
    auth::MaybeUser,
    error::AppResult,
    state::AppState,
    templates::{render, NotFoundTemplate},
};

/// Health check handler
/// Returns "OK" once the database answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}

/// Fallback for every unknown path
pub async fn not_found(
    MaybeUser(user): MaybeUser,
    OriginalUri(uri): OriginalUri,
) -> AppResult<(StatusCode, Html<String>)> {
    debug!("No route for {}", uri.path());

    let page = render(&NotFoundTemplate {
        user,
        message: uri.path().to_string(),
    })?;
    Ok((StatusCode::NOT_FOUND, page))
}
