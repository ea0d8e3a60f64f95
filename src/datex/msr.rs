//! Measured data report (MSR) parser.

use chrono::DateTime;

use super::xml::{self, Element};
use super::{ParseError, DATEX_NS};
use crate::catalog::ReferenceCatalog;
use crate::entity::{
    detector_id_to_station_id, DetectorMeasurement, MeasurementKind, SensorReading, NO_REGION,
};

/// Reason recorded when a data error carries no reason text.
pub const UNKNOWN_ERROR_REASON: &str = "unknown";

/// Parse a measurement report into one record per site measurement node.
///
/// Regions are looked up in the catalog by detector id; detectors without a
/// known region get [`NO_REGION`] rather than failing the parse.
///
/// # Errors
///
/// Returns a `ParseError` if the document is malformed, does not use the
/// DATEX II namespace, has no site measurements, or a site measurement lacks
/// its detector reference, timestamp, or a valid channel index.
pub fn parse_measurement_report(
    content: &[u8],
    catalog: &ReferenceCatalog,
) -> Result<Vec<DetectorMeasurement>, ParseError> {
    let root = xml::parse_document(content)?;
    if !root.uses_namespace(DATEX_NS) {
        return Err(ParseError::MissingNamespace(DATEX_NS));
    }

    let sites = root.find_all(DATEX_NS, "siteMeasurements");
    if sites.is_empty() {
        return Err(ParseError::NoMatchingNodes("siteMeasurements"));
    }

    let measurements = sites
        .into_iter()
        .map(|site| parse_site(site, catalog))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        detectors = measurements.len(),
        readings = measurements.iter().map(|m| m.sensor_measurements.len()).sum::<usize>(),
        "Parsed measurement report"
    );
    Ok(measurements)
}

fn parse_site(
    site: &Element,
    catalog: &ReferenceCatalog,
) -> Result<DetectorMeasurement, ParseError> {
    let id = site
        .find_all(DATEX_NS, "measurementSiteReference")
        .into_iter()
        .find_map(|r| r.attr("id"))
        .ok_or(ParseError::MissingElement {
            context: "siteMeasurements".to_string(),
            element: "measurementSiteReference",
        })?
        .to_string();

    let raw_time =
        site.find_text(DATEX_NS, "measurementTimeDefault")
            .ok_or_else(|| ParseError::MissingElement {
                context: format!("siteMeasurements {id}"),
                element: "measurementTimeDefault",
            })?;
    let time = DateTime::parse_from_rfc3339(raw_time).map_err(|_| ParseError::InvalidValue {
        context: format!("siteMeasurements {id}"),
        field: "measurementTimeDefault",
        value: raw_time.to_string(),
    })?;

    let sensor_measurements = site
        .find_all(DATEX_NS, "measuredValue")
        .into_iter()
        .filter(|v| v.attr("index").is_some())
        .map(|v| parse_reading(&id, v))
        .collect::<Result<Vec<_>, _>>()?;

    let canton = catalog
        .detector_region(&id)
        .unwrap_or(NO_REGION)
        .to_string();

    Ok(DetectorMeasurement {
        station_id: detector_id_to_station_id(&id).to_string(),
        id,
        time,
        canton,
        sensor_measurements,
    })
}

fn parse_reading(detector_id: &str, node: &Element) -> Result<SensorReading, ParseError> {
    let raw_index = node.attr("index").unwrap_or_default();
    let index = raw_index
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidValue {
            context: format!("detector {detector_id}"),
            field: "measuredValue index",
            value: raw_index.to_string(),
        })?;

    let Some(basic_data) = node.find(DATEX_NS, "basicData") else {
        tracing::warn!(detector_id, index, "Measured value has no basic data");
        return Ok(SensorReading::neutral(index));
    };

    if basic_data.find(DATEX_NS, "dataError").is_some() {
        let reason = basic_data
            .find(DATEX_NS, "reasonForDataError")
            .and_then(|r| r.find_text(DATEX_NS, "value"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                tracing::warn!(detector_id, index, "Data error without a reason");
                UNKNOWN_ERROR_REASON.to_string()
            });
        return Ok(SensorReading::error(index, reason));
    }

    let kind = basic_data
        .attr("type")
        .map_or(MeasurementKind::Unknown, MeasurementKind::from_datex);

    let reading = match kind {
        MeasurementKind::TrafficFlow => basic_data
            .find_text(DATEX_NS, "vehicleFlowRate")
            .and_then(parse_value)
            .map(|value| SensorReading::flow(index, value)),
        MeasurementKind::TrafficSpeed => {
            let inputs = basic_data
                .find_all(DATEX_NS, "averageVehicleSpeed")
                .into_iter()
                .find_map(|s| s.attr("numberOfInputValuesUsed"))
                .and_then(|n| n.trim().parse::<i64>().ok());
            let speed = basic_data
                .find_text(DATEX_NS, "speed")
                .and_then(parse_value);
            if speed.is_some() && inputs.is_none() {
                tracing::debug!(detector_id, index, "Speed without numberOfInputValuesUsed");
            }
            speed.map(|value| SensorReading::speed(index, value, inputs))
        }
        MeasurementKind::Unknown => Some(SensorReading::neutral(index)),
    };

    Ok(reading.unwrap_or_else(|| {
        tracing::warn!(detector_id, index, kind = kind.as_tag(), "Could not read measured value");
        SensorReading::neutral(index)
    }))
}

fn parse_value(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
