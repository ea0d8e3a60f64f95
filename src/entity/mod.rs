//! Canonical domain model shared by the parsers, the ingestion cycle and the
//! query layer.

pub mod measurement;
pub mod station;

pub use measurement::{DetectorMeasurement, MeasurementKind, SensorReading};
pub use station::{Characteristic, Detector, Station};

/// Region value used when a detector has no known region.
pub const NO_REGION: &str = "none";

/// Derive the station id from a detector id: `CH:0002.01` -> `CH:0002`.
#[must_use]
pub fn detector_id_to_station_id(detector_id: &str) -> &str {
    detector_id
        .split_once('.')
        .map_or(detector_id, |(station, _)| station)
}

/// Derive the numeric id from a station id: `CH:0002` -> `2`.
///
/// Returns `None` when the id has no `:` separator or a non-numeric suffix.
#[must_use]
pub fn station_id_to_number_id(station_id: &str) -> Option<u32> {
    let (_, number) = station_id.split_once(':')?;
    number.trim().parse().ok()
}
