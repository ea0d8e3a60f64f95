pub mod cantons;
pub mod health;
pub mod ingestion;
pub mod measurements;
pub mod stations;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::error::{AppError, AppResult};

/// Collapse a failed aggregate query into an empty list.
///
/// Store and upstream failures are logged and answered with `[]`; rejected
/// parameters stay errors so the caller sees a 400.
pub fn or_empty<T>(what: &str, result: AppResult<Vec<T>>) -> AppResult<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(e @ AppError::BadRequest(_)) => Err(e),
        Err(e) => {
            tracing::error!(query = what, error = %e, "Query failed, returning empty result");
            Ok(Vec::new())
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        stations::list_stations,
        cantons::list_cantons,
        cantons::total_number_of_errors,
        cantons::number_of_errors,
        cantons::mean_values,
        measurements::detector_measurements,
        ingestion::status,
        ingestion::trigger,
    ),
    components(
        schemas(
            crate::entity::Station,
            crate::entity::Detector,
            crate::entity::Characteristic,
            crate::entity::MeasurementKind,
            crate::query::mapper::StationErrorCount,
            crate::query::mapper::RegionErrorCount,
            crate::query::mapper::RegionErrorSeries,
            crate::query::mapper::ErrorBin,
            crate::query::mapper::GroupMean,
            crate::query::mapper::DetectorSeries,
            crate::query::mapper::DetectorReadingPoint,
            crate::query::service::RegionOption,
            crate::query::service::SeriesRequest,
            measurements::DetectorMeasurementsRequest,
            crate::sync::IngestionStatus,
            crate::sync::scheduler::TickRecord,
            crate::sync::TickOutcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "stations", description = "Measurement stations and their error counts"),
        (name = "cantons", description = "Per-canton aggregates"),
        (name = "measurements", description = "Raw detector history"),
        (name = "ingestion", description = "Measurement feed ingestion"),
    ),
    info(
        title = "Traffic DB API",
        description = "Road-sensor telemetry and error analytics for the Swiss DATEX II feed",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/stations", get(stations::list_stations))
        .route("/cantons", get(cantons::list_cantons))
        .route(
            "/cantons/total_number_of_errors",
            get(cantons::total_number_of_errors),
        )
        .route("/cantons/number_of_errors", get(cantons::number_of_errors))
        .route("/cantons/mean_values", get(cantons::mean_values))
        .route(
            "/detector_measurements",
            post(measurements::detector_measurements),
        )
        .route("/ingestion/status", get(ingestion::status))
        .route("/ingestion/trigger", post(ingestion::trigger))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    let health_routes = Router::new().route("/healthz", get(health::healthz));

    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
