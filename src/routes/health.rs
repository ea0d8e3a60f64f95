use axum::{extract::State, http::StatusCode};

use crate::common::AppState;

/// Health check endpoint
///
/// Returns 200 OK while the service runs and the station list is loaded,
/// 503 when no stations are known.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "No stations loaded"),
    ),
    tag = "health"
)]
pub async fn healthz(State(state): State<AppState>) -> StatusCode {
    if state.reference.stations.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}
