use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::common::AppState;
use crate::entity::MeasurementKind;
use crate::error::{AppError, AppResult};
use crate::query::mapper::{GroupMean, RegionErrorCount, RegionErrorSeries};
use crate::query::service::RegionOption;

use super::or_empty;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CantonTotalsQuery {
    /// Canton code, or `all` (default) for every canton
    pub canton: Option<String>,
    /// Range start: duration literal (`-4h`) or RFC 3339 instant
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CantonBinsQuery {
    /// Canton code or `all`; required, an empty value yields `[]`
    pub canton: Option<String>,
    /// Range start: duration literal (`-4h`) or RFC 3339 instant
    pub time: Option<String>,
    /// Window size such as `10m`; derived from `time` when omitted
    #[serde(alias = "binSize")]
    pub bin_size: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MeanValuesQuery {
    /// Canton code for per-station means, or `all` (default) for per-canton means
    pub canton: Option<String>,
    /// Range start: duration literal (`-4h`) or RFC 3339 instant
    pub time: Option<String>,
    /// `trafficFlow` or `trafficSpeed`
    pub kind: MeasurementKind,
}

/// List cantons available as filters
#[utoipa::path(
    get,
    path = "/api/cantons",
    responses(
        (status = 200, description = "Cantons retrieved successfully", body = Vec<RegionOption>),
    ),
    tag = "cantons"
)]
pub async fn list_cantons(State(state): State<AppState>) -> Json<Vec<RegionOption>> {
    Json(state.queries.regions())
}

/// Total number of errors per canton
#[utoipa::path(
    get,
    path = "/api/cantons/total_number_of_errors",
    params(CantonTotalsQuery),
    responses(
        (status = 200, description = "Totals retrieved successfully", body = Vec<RegionErrorCount>),
        (status = 400, description = "Invalid time range"),
    ),
    tag = "cantons"
)]
pub async fn total_number_of_errors(
    State(state): State<AppState>,
    Query(query): Query<CantonTotalsQuery>,
) -> AppResult<Json<Vec<RegionErrorCount>>> {
    let totals = state
        .queries
        .region_error_totals(query.canton.as_deref(), query.time.as_deref())
        .await;
    Ok(Json(or_empty("region_error_totals", totals)?))
}

/// Number of errors per canton and time bin
#[utoipa::path(
    get,
    path = "/api/cantons/number_of_errors",
    params(CantonBinsQuery),
    responses(
        (status = 200, description = "Bins retrieved successfully", body = Vec<RegionErrorSeries>),
        (status = 400, description = "Invalid time range or bin size"),
    ),
    tag = "cantons"
)]
pub async fn number_of_errors(
    State(state): State<AppState>,
    Query(query): Query<CantonBinsQuery>,
) -> AppResult<Json<Vec<RegionErrorSeries>>> {
    let bins = state
        .queries
        .region_error_bins(
            query.canton.as_deref(),
            query.time.as_deref(),
            query.bin_size.as_deref(),
        )
        .await;
    Ok(Json(or_empty("region_error_bins", bins)?))
}

/// Mean measured value per canton, or per station of one canton
#[utoipa::path(
    get,
    path = "/api/cantons/mean_values",
    params(MeanValuesQuery),
    responses(
        (status = 200, description = "Means retrieved successfully", body = Vec<GroupMean>),
        (status = 400, description = "Invalid kind or time range"),
    ),
    tag = "cantons"
)]
pub async fn mean_values(
    State(state): State<AppState>,
    Query(query): Query<MeanValuesQuery>,
) -> AppResult<Json<Vec<GroupMean>>> {
    if query.kind == MeasurementKind::Unknown {
        return Err(AppError::BadRequest(
            "kind must be trafficFlow or trafficSpeed".to_string(),
        ));
    }

    let means = state
        .queries
        .mean_values(query.canton.as_deref(), query.time.as_deref(), query.kind)
        .await;
    Ok(Json(or_empty("mean_values", means)?))
}
