//! Measurement site table (MST) parser.
//!
//! Detector records are grouped into stations positionally: the records of
//! one station must be contiguous in document order. A station id that shows
//! up again after its group was closed starts a second station with the same
//! id; this is logged but not merged.

use std::collections::HashSet;

use super::xml::{self, Element};
use super::{ParseError, DATEX_NS, NATIONAL_PREFIX};
use crate::entity::{
    detector_id_to_station_id, station_id_to_number_id, Characteristic, Detector,
    MeasurementKind, Station,
};

/// Parse a site-table document into stations with nested detectors.
///
/// The result is not enriched: names, regions and LV95 coordinates are empty.
///
/// # Errors
///
/// Returns a `ParseError` if the document is malformed, does not use the
/// DATEX II namespace, contains no national site records, or a record id
/// cannot be mapped to a numeric station id.
pub fn parse_site_table(content: &[u8]) -> Result<Vec<Station>, ParseError> {
    let root = xml::parse_document(content)?;
    if !root.uses_namespace(DATEX_NS) {
        return Err(ParseError::MissingNamespace(DATEX_NS));
    }

    let records: Vec<&Element> = root
        .find_all(DATEX_NS, "measurementSiteRecord")
        .into_iter()
        .filter(|r| r.attr("id").is_some_and(|id| id.starts_with(NATIONAL_PREFIX)))
        .collect();

    if records.is_empty() {
        return Err(ParseError::NoMatchingNodes("measurementSiteRecord"));
    }

    let mut stations: Vec<Station> = Vec::new();
    let mut closed: HashSet<String> = HashSet::new();
    let mut current: Option<Station> = None;

    for record in records {
        let detector = parse_detector(record)?;
        let station_id = detector_id_to_station_id(&detector.id).to_string();

        if current.as_ref().is_none_or(|s| s.id != station_id) {
            if let Some(done) = current.take() {
                closed.insert(done.id.clone());
                stations.push(done);
            }
            if closed.contains(&station_id) {
                tracing::warn!(
                    station_id = %station_id,
                    detector_id = %detector.id,
                    "Detector records of station are not contiguous, starting a second group"
                );
            }
            let number_id = station_id_to_number_id(&station_id).ok_or_else(|| {
                ParseError::InvalidValue {
                    context: format!("measurementSiteRecord {}", detector.id),
                    field: "station id",
                    value: station_id.clone(),
                }
            })?;
            current = Some(Station::new(station_id, number_id));
        }

        if let Some(station) = current.as_mut() {
            station.detectors.push(detector);
        }
    }
    stations.extend(current);

    tracing::debug!(stations = stations.len(), "Parsed measurement site table");
    Ok(stations)
}

fn parse_detector(record: &Element) -> Result<Detector, ParseError> {
    let id = record.attr("id").unwrap_or_default().to_string();

    let point = record.find(DATEX_NS, "pointCoordinates");
    let latitude = point.and_then(|p| parse_float(p.find_text(DATEX_NS, "latitude")));
    let longitude = point.and_then(|p| parse_float(p.find_text(DATEX_NS, "longitude")));
    if latitude.is_none() || longitude.is_none() {
        tracing::warn!(detector_id = %id, "Could not find point coordinates for detector");
    }

    let direction = record
        .find_text(DATEX_NS, "alertCDirectionCoded")
        .map(str::to_string);
    if direction.is_none() {
        tracing::warn!(detector_id = %id, "Could not find a direction for detector");
    }

    let location_id = match record.find_text(DATEX_NS, "specificLocation") {
        Some(text) => {
            let parsed = text.parse::<i64>().ok();
            if parsed.is_none() {
                tracing::warn!(detector_id = %id, value = text, "Invalid location id for detector");
            }
            parsed
        }
        None => {
            tracing::warn!(detector_id = %id, "Could not find a location id for detector");
            None
        }
    };

    // Channel indices are unique per detector; the first occurrence wins
    let mut characteristics = Vec::new();
    let mut seen_indices = HashSet::new();
    for node in record
        .find_all(DATEX_NS, "measurementSpecificCharacteristics")
        .into_iter()
        .filter(|c| c.attr("index").is_some())
    {
        let characteristic = parse_characteristic(&id, node)?;
        if seen_indices.insert(characteristic.index) {
            characteristics.push(characteristic);
        } else {
            tracing::warn!(
                detector_id = %id,
                index = characteristic.index,
                "Duplicate characteristic index, keeping the first"
            );
        }
    }

    Ok(Detector {
        id,
        latitude,
        longitude,
        direction,
        characteristics,
        location_id,
        name: None,
    })
}

fn parse_characteristic(detector_id: &str, node: &Element) -> Result<Characteristic, ParseError> {
    let raw_index = node.attr("index").unwrap_or_default();
    let index = raw_index
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidValue {
            context: format!("detector {detector_id}"),
            field: "characteristic index",
            value: raw_index.to_string(),
        })?;

    let period = match parse_float(node.find_text(DATEX_NS, "period")) {
        #[allow(clippy::cast_possible_truncation)]
        Some(seconds) => seconds.round() as i32,
        None => {
            tracing::warn!(detector_id, index, "Could not find a period for characteristic");
            Characteristic::UNKNOWN_PERIOD
        }
    };

    let measurement = match node.find_text(DATEX_NS, "specificMeasurementValueType") {
        Some(value) => MeasurementKind::from_datex(value),
        None => {
            tracing::warn!(detector_id, index, "Could not find a measurement for characteristic");
            MeasurementKind::Unknown
        }
    };

    let vehicle_type = node.find_text(DATEX_NS, "vehicleType").map(str::to_string);
    if vehicle_type.is_none() {
        tracing::warn!(detector_id, index, "Could not find a vehicle type for characteristic");
    }

    Ok(Characteristic {
        index,
        period,
        measurement,
        vehicle_type,
    })
}

fn parse_float(text: Option<&str>) -> Option<f64> {
    text.and_then(|t| t.parse::<f64>().ok())
}
