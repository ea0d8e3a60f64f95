use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::catalog::ReferenceCatalog;
use crate::common::ReferenceData;
use crate::config::Config;
use crate::datex::{enrich, msr, mst, FeedDocument, FeedSource};
use crate::entity::{DetectorMeasurement, MeasurementKind, Station, NO_REGION};
use crate::error::{AppError, AppResult};
use crate::influx::{FieldValue, StoredPoint, TimeSeriesStore};
use crate::query::builder::ERROR_TAG_TRUE;
use crate::services::cache::QueryCache;

pub const ERROR_TAG_FALSE: &str = "False";

/// Result of one ingestion tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TickOutcome {
    /// The batch was written.
    Written { points: usize },
    /// Nothing was fetched, so nothing was written.
    Skipped { reason: String },
    /// Fetch, parse, or write failed; the next tick retries.
    Failed { error: String },
}

/// Flatten measurements into one stored point per channel reading.
///
/// All points are stamped with `written_at`; the report's own timestamp is
/// not stored.
#[must_use]
pub fn measurement_points(
    measurement: &str,
    detector_measurements: &[DetectorMeasurement],
    written_at: DateTime<Utc>,
) -> Vec<StoredPoint> {
    detector_measurements
        .iter()
        .flat_map(|m| {
            let canton = if m.canton.is_empty() { NO_REGION } else { &m.canton };
            m.sensor_measurements.iter().map(move |reading| {
                StoredPoint::new(measurement, written_at)
                    .tag("id", m.id.as_str())
                    .tag("index", reading.index.to_string())
                    .tag(
                        "hasError",
                        if reading.has_error { ERROR_TAG_TRUE } else { ERROR_TAG_FALSE },
                    )
                    .tag("canton", canton)
                    .tag("stationId", m.station_id.as_str())
                    .tag("kind", reading.kind.unwrap_or(MeasurementKind::Unknown).as_tag())
                    .field("value", FieldValue::Float(reading.value))
                    .field(
                        "numberOfInputValuesUsed",
                        FieldValue::Integer(reading.number_of_input_values_used.unwrap_or(0)),
                    )
                    .field(
                        "errorReason",
                        FieldValue::String(
                            reading
                                .error_reason
                                .clone()
                                .unwrap_or_else(|| "none".to_string()),
                        ),
                    )
            })
        })
        .collect()
}

/// One fetch -> parse -> write pass over the measurement feed.
pub struct IngestionCycle<F, S> {
    feed: Arc<F>,
    store: Arc<S>,
    reference: Arc<ReferenceData>,
    measurement: String,
    cache: Option<QueryCache>,
}

impl<F: FeedSource, S: TimeSeriesStore> IngestionCycle<F, S> {
    #[must_use]
    pub fn new(
        feed: Arc<F>,
        store: Arc<S>,
        reference: Arc<ReferenceData>,
        measurement: String,
    ) -> Self {
        Self {
            feed,
            store,
            reference,
            measurement,
            cache: None,
        }
    }

    /// Invalidate this cache after every successful write.
    #[must_use]
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run one tick. Never fails: errors are logged and reported in the outcome.
    pub async fn run_once(&self) -> TickOutcome {
        match self.ingest().await {
            Ok(Some(points)) => {
                tracing::info!(points, "Ingestion tick completed");
                TickOutcome::Written { points }
            }
            Ok(None) => {
                tracing::info!("Ingestion tick skipped, no measurement report fetched");
                TickOutcome::Skipped {
                    reason: "no measurement report fetched".to_string(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Ingestion tick failed");
                TickOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn ingest(&self) -> AppResult<Option<usize>> {
        let Some(content) = self.feed.fetch(FeedDocument::MeasuredData).await? else {
            return Ok(None);
        };

        let measurements = msr::parse_measurement_report(&content, &self.reference.catalog)?;
        let points = measurement_points(&self.measurement, &measurements, Utc::now());

        tracing::debug!(
            detectors = measurements.len(),
            points = points.len(),
            "Writing detector measurements"
        );
        self.store.write_points(&points).await?;

        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
        Ok(Some(points.len()))
    }
}

/// Fetch, parse and enrich the site table.
///
/// Returns `Ok(None)` if the feed skipped the fetch.
///
/// # Errors
///
/// Returns an error if the fetch fails, the document cannot be parsed, or a
/// station is missing from the catalog.
pub async fn fetch_stations<F: FeedSource>(
    feed: &F,
    catalog: &ReferenceCatalog,
) -> AppResult<Option<Vec<Station>>> {
    let Some(content) = feed.fetch(FeedDocument::SiteTable).await? else {
        return Ok(None);
    };
    let stations = mst::parse_site_table(&content)?;
    enrich::enrich_stations(stations, catalog).map(Some)
}

/// Read a station snapshot written by [`write_station_snapshot`].
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// Returns `AppError::Internal` if the file cannot be read or decoded.
pub fn read_station_snapshot(path: &Path) -> AppResult<Option<Vec<Station>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read(path)
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| AppError::Internal(format!("Invalid station snapshot {}: {e}", path.display())))
}

/// # Errors
///
/// Returns `AppError::Internal` if the snapshot cannot be written.
pub fn write_station_snapshot(path: &Path, stations: &[Station]) -> AppResult<()> {
    let json = serde_json::to_vec_pretty(stations)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    std::fs::write(path, json)
        .map_err(|e| AppError::Internal(format!("Failed to write {}: {e}", path.display())))
}

/// Stations to serve at startup.
///
/// Uses the snapshot unless a refresh is requested or it is missing or
/// unreadable; otherwise parses the site table and writes a new snapshot.
///
/// # Errors
///
/// Returns an error if no snapshot is usable and the site table cannot be
/// fetched, parsed, or enriched.
pub async fn initial_stations<F: FeedSource>(
    config: &Config,
    feed: &F,
    catalog: &ReferenceCatalog,
) -> AppResult<Vec<Station>> {
    let path = &config.stations_snapshot_path;

    if !config.refresh_stations {
        match read_station_snapshot(path) {
            Ok(Some(stations)) => {
                tracing::info!(
                    stations = stations.len(),
                    path = %path.display(),
                    "Loaded station snapshot"
                );
                return Ok(stations);
            }
            Ok(None) => tracing::info!(path = %path.display(), "No station snapshot found"),
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable station snapshot"),
        }
    }

    tracing::info!("Parsing measurement site table...");
    let stations = fetch_stations(feed, catalog).await?.ok_or_else(|| {
        AppError::Upstream("site table fetch was skipped and no snapshot is available".to_string())
    })?;

    if let Err(e) = write_station_snapshot(path, &stations) {
        tracing::warn!(error = %e, "Failed to write station snapshot");
    }

    Ok(stations)
}
