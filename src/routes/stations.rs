use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::common::AppState;
use crate::error::AppResult;
use crate::query::mapper::StationErrorCount;

use super::or_empty;

#[derive(Debug, Deserialize, IntoParams)]
pub struct StationsQuery {
    /// Canton code, or `all` (default) for every station
    pub canton: Option<String>,
    /// Range start: duration literal (`-4h`) or RFC 3339 instant
    pub time: Option<String>,
}

/// List stations with their error counts
#[utoipa::path(
    get,
    path = "/api/stations",
    params(StationsQuery),
    responses(
        (status = 200, description = "Stations retrieved successfully", body = Vec<StationErrorCount>),
        (status = 400, description = "Invalid time range"),
    ),
    tag = "stations"
)]
pub async fn list_stations(
    State(state): State<AppState>,
    Query(query): Query<StationsQuery>,
) -> AppResult<Json<Vec<StationErrorCount>>> {
    let stations = state
        .queries
        .stations_with_errors(query.canton.as_deref(), query.time.as_deref())
        .await;
    Ok(Json(or_empty("stations_with_errors", stations)?))
}
