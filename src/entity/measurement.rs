use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MeasurementKind {
    TrafficFlow,
    TrafficSpeed,
    Unknown,
}

impl MeasurementKind {
    /// Classify a DATEX II value type or `xsi:type` discriminator.
    ///
    /// Accepts both the characteristic spelling (`trafficFlow`) and the
    /// basic-data type name (`TrafficFlow`, optionally prefixed).
    #[must_use]
    pub fn from_datex(value: &str) -> Self {
        let local = value.rsplit(':').next().unwrap_or(value).trim();
        match local {
            "trafficFlow" | "TrafficFlow" => Self::TrafficFlow,
            "trafficSpeed" | "TrafficSpeed" => Self::TrafficSpeed,
            _ => Self::Unknown,
        }
    }

    /// Tag value as written to the time-series store.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::TrafficFlow => "trafficFlow",
            Self::TrafficSpeed => "trafficSpeed",
            Self::Unknown => "none",
        }
    }
}

/// One channel reading of a detector.
///
/// `has_error` is true exactly when `error_reason` is set, and an erroneous
/// reading always carries a value of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub index: u32,
    pub value: f64,
    pub has_error: bool,
    pub error_reason: Option<String>,
    pub number_of_input_values_used: Option<i64>,
    pub kind: Option<MeasurementKind>,
}

impl SensorReading {
    #[must_use]
    pub fn error(index: u32, reason: String) -> Self {
        Self {
            index,
            value: 0.0,
            has_error: true,
            error_reason: Some(reason),
            number_of_input_values_used: None,
            kind: None,
        }
    }

    #[must_use]
    pub fn flow(index: u32, value: f64) -> Self {
        Self {
            index,
            value,
            has_error: false,
            error_reason: None,
            number_of_input_values_used: None,
            kind: Some(MeasurementKind::TrafficFlow),
        }
    }

    #[must_use]
    pub fn speed(index: u32, value: f64, number_of_input_values_used: Option<i64>) -> Self {
        Self {
            index,
            value,
            has_error: false,
            error_reason: None,
            number_of_input_values_used,
            kind: Some(MeasurementKind::TrafficSpeed),
        }
    }

    /// Reading with an unrecognised type discriminator.
    #[must_use]
    pub fn neutral(index: u32) -> Self {
        Self {
            index,
            value: 0.0,
            has_error: false,
            error_reason: None,
            number_of_input_values_used: None,
            kind: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorMeasurement {
    pub id: String,
    pub time: DateTime<FixedOffset>,
    pub station_id: String,
    pub canton: String,
    pub sensor_measurements: Vec<SensorReading>,
}
