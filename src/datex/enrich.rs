use crate::catalog::{lv95_to_wgs84, ReferenceCatalog};
use crate::entity::Station;
use crate::error::{AppError, AppResult};

/// Fill in names, region and coordinates of parsed stations from the catalog.
///
/// Geodetic coordinates are always recomputed from the catalog's LV95 pair, so
/// enriching an already enriched list yields the same stations.
///
/// # Errors
///
/// Returns `AppError::Integrity` if a station has no entry in the catalog.
pub fn enrich_stations(
    mut stations: Vec<Station>,
    catalog: &ReferenceCatalog,
) -> AppResult<Vec<Station>> {
    for station in &mut stations {
        let location = catalog.station_location(station.number_id).ok_or_else(|| {
            AppError::Integrity(format!(
                "station {} (number id {}) has no entry in the station location table",
                station.id, station.number_id
            ))
        })?;

        #[allow(clippy::cast_precision_loss)]
        let position = lv95_to_wgs84(location.east_lv95 as f64, location.north_lv95 as f64);

        station.name.clone_from(&location.name);
        station.canton.clone_from(&location.canton);
        station.east_lv95 = Some(location.east_lv95);
        station.north_lv95 = Some(location.north_lv95);
        station.longitude = Some(position.longitude);
        station.latitude = Some(position.latitude);

        for detector in &mut station.detectors {
            detector.name = detector
                .location_id
                .and_then(|id| catalog.detector_name(id))
                .map(str::to_string);
        }
    }

    tracing::info!(stations = stations.len(), "Stations enriched");
    Ok(stations)
}
