use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::common::AppState;
use crate::sync::{IngestionStatus, TickOutcome};

/// Scheduler state and the outcome of the last tick
#[utoipa::path(
    get,
    path = "/api/ingestion/status",
    responses(
        (status = 200, description = "Ingestion status", body = IngestionStatus),
    ),
    tag = "ingestion"
)]
pub async fn status(State(state): State<AppState>) -> Json<IngestionStatus> {
    Json(state.ingestion.status())
}

/// Run one ingestion tick now
///
/// Answers 409 when a tick is already in flight.
#[utoipa::path(
    post,
    path = "/api/ingestion/trigger",
    responses(
        (status = 200, description = "Tick finished", body = TickOutcome),
        (status = 409, description = "A tick is already running"),
    ),
    tag = "ingestion"
)]
pub async fn trigger(State(state): State<AppState>) -> Response {
    match state.ingestion.tick().await {
        Some(outcome) => Json(outcome).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Ingestion tick already in progress" })),
        )
            .into_response(),
    }
}
