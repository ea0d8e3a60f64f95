//! Mapping of Flux result tables back onto response shapes.
//!
//! Flat aggregations are zero-filled over a key universe taken from the
//! reference data, never from the query result, so entities without matching
//! rows still appear with a count of 0.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use super::builder::GroupKey;
use crate::entity::Station;
use crate::influx::response::flatten;
use crate::influx::FluxTable;

/// Column holding the aggregate of a flat query.
const VALUE_COLUMN: &str = "_value";
/// Column holding the pivoted `value` field.
const FIELD_VALUE_COLUMN: &str = "value";
/// Stored placeholder for "no error reason".
const NO_REASON: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StationErrorCount {
    #[serde(flatten)]
    pub station: Station,
    pub number_of_errors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionErrorCount {
    pub canton: String,
    pub number_of_errors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBin {
    pub time: DateTime<Utc>,
    pub number_of_errors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RegionErrorSeries {
    pub name: String,
    pub measurements: Vec<ErrorBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMean {
    pub key: String,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectorReadingPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
    pub number_of_input_values_used: Option<i64>,
    pub error_reason: Option<String>,
    pub has_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSeries {
    pub id: String,
    pub index: u32,
    pub name: Option<String>,
    pub measurements: Vec<DetectorReadingPoint>,
}

/// Build `group key -> count` from a flat aggregation result.
#[must_use]
pub fn counts_by_key(tables: &[FluxTable], key_column: &str) -> HashMap<String, i64> {
    let mut counts = HashMap::new();
    for record in flatten(tables) {
        if let (Some(key), Some(count)) = (record.get(key_column), record.get_i64(VALUE_COLUMN)) {
            *counts.entry(key.to_string()).or_insert(0) += count;
        }
    }
    counts
}

/// Attach error counts to every station of `stations`, defaulting to 0.
#[must_use]
pub fn map_station_errors(stations: &[Station], tables: &[FluxTable]) -> Vec<StationErrorCount> {
    let counts = counts_by_key(tables, GroupKey::Station.column());
    stations
        .iter()
        .map(|station| StationErrorCount {
            number_of_errors: counts.get(&station.id).copied().unwrap_or(0),
            station: station.clone(),
        })
        .collect()
}

/// Error totals for every region of `regions`, defaulting to 0.
#[must_use]
pub fn map_region_errors(regions: &[String], tables: &[FluxTable]) -> Vec<RegionErrorCount> {
    let counts = counts_by_key(tables, GroupKey::Region.column());
    regions
        .iter()
        .map(|region| RegionErrorCount {
            canton: region.clone(),
            number_of_errors: counts.get(region).copied().unwrap_or(0),
        })
        .collect()
}

/// One series per result table; table order is bin order.
///
/// All rows of a table share the region (the query grouped by it), so the
/// name is read from the first row. Empty tables are skipped.
#[must_use]
pub fn map_region_error_bins(tables: &[FluxTable]) -> Vec<RegionErrorSeries> {
    tables
        .iter()
        .filter_map(|table| {
            let name = table.records.first()?.get(GroupKey::Region.column())?.to_string();
            let measurements = table
                .records
                .iter()
                .filter_map(|record| {
                    Some(ErrorBin {
                        time: record.get_time("_time")?,
                        number_of_errors: record.get_i64(VALUE_COLUMN).unwrap_or(0),
                    })
                })
                .collect();
            Some(RegionErrorSeries { name, measurements })
        })
        .collect()
}

/// Mean per key of `keys`; keys without rows get `None`.
#[must_use]
pub fn map_group_means(keys: &[String], key_column: &str, tables: &[FluxTable]) -> Vec<GroupMean> {
    let means: HashMap<&str, f64> = flatten(tables)
        .into_iter()
        .filter_map(|r| Some((r.get(key_column)?, r.get_f64(VALUE_COLUMN)?)))
        .collect();
    keys.iter()
        .map(|key| GroupMean {
            key: key.clone(),
            mean: means.get(key.as_str()).copied(),
        })
        .collect()
}

/// Raw readings of one detector channel in time order.
#[must_use]
pub fn map_detector_series(
    id: &str,
    index: u32,
    name: Option<String>,
    tables: &[FluxTable],
) -> DetectorSeries {
    let mut measurements: Vec<DetectorReadingPoint> = flatten(tables)
        .into_iter()
        .filter_map(|record| {
            Some(DetectorReadingPoint {
                time: record.get_time("_time")?,
                value: record.get_f64(FIELD_VALUE_COLUMN),
                number_of_input_values_used: record.get_i64("numberOfInputValuesUsed"),
                error_reason: record
                    .get("errorReason")
                    .filter(|r| !r.is_empty() && *r != NO_REASON)
                    .map(str::to_string),
                has_error: record
                    .get("hasError")
                    .is_some_and(|e| e.eq_ignore_ascii_case("true")),
            })
        })
        .collect();
    measurements.sort_by_key(|m| m.time);

    DetectorSeries {
        id: id.to_string(),
        index,
        name,
        measurements,
    }
}
