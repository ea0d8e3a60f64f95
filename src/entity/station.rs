use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::MeasurementKind;

/// A measurement station: one or more detectors sharing a station id.
///
/// `name`, `canton` and the coordinates are empty until the station has been
/// enriched against the reference catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub number_id: u32,
    pub name: String,
    pub canton: String,
    pub east_lv95: Option<i64>,
    pub north_lv95: Option<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub detectors: Vec<Detector>,
}

impl Station {
    #[must_use]
    pub fn new(id: String, number_id: u32) -> Self {
        Self {
            id,
            number_id,
            name: String::new(),
            canton: String::new(),
            east_lv95: None,
            north_lv95: None,
            longitude: None,
            latitude: None,
            detectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Detector {
    /// Station id plus sub-index, e.g. `CH:0002.01`.
    pub id: String,
    /// Position as published in the site table (display only).
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub direction: Option<String>,
    pub characteristics: Vec<Characteristic>,
    pub location_id: Option<i64>,
    pub name: Option<String>,
}

impl Detector {
    /// One-based channel indices in document order.
    pub fn channel_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.characteristics.iter().map(|c| c.index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Characteristic {
    pub index: u32,
    /// Sampling period in seconds, `-1` when the document omits it.
    pub period: i32,
    pub measurement: MeasurementKind,
    pub vehicle_type: Option<String>,
}

impl Characteristic {
    pub const UNKNOWN_PERIOD: i32 = -1;
}
