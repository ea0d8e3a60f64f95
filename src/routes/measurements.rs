use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::common::AppState;
use crate::error::AppResult;
use crate::query::mapper::DetectorSeries;
use crate::query::SeriesRequest;

use super::or_empty;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectorMeasurementsRequest {
    pub detector_measurements: Vec<SeriesRequest>,
    /// Range start: duration literal (`-4h`) or RFC 3339 instant
    pub time: Option<String>,
}

/// Stored history of the requested detector channels
#[utoipa::path(
    post,
    path = "/api/detector_measurements",
    request_body = DetectorMeasurementsRequest,
    responses(
        (status = 200, description = "Series retrieved successfully", body = Vec<DetectorSeries>),
        (status = 400, description = "Invalid time range"),
    ),
    tag = "measurements"
)]
pub async fn detector_measurements(
    State(state): State<AppState>,
    Json(request): Json<DetectorMeasurementsRequest>,
) -> AppResult<Json<Vec<DetectorSeries>>> {
    let series = state
        .queries
        .detector_series(&request.detector_measurements, request.time.as_deref())
        .await;
    Ok(Json(or_empty("detector_series", series)?))
}
