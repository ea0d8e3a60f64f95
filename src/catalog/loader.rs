use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{CatalogError, StationLocation};

#[derive(Debug, Deserialize)]
struct StationLocationRow {
    id: u32,
    description: String,
    canton: String,
    east_lv95: i64,
    north_lv95: i64,
}

#[derive(Debug, Deserialize)]
struct DetectorNameRow {
    lcd: String,
    name: String,
}

/// Pick `;` or `,` from the header line.
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn read_required(path: &Path) -> Result<String, CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::MissingFile(path.display().to_string()));
    }
    fs::read_to_string(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Parse the station location table keyed by numeric station id.
///
/// # Errors
///
/// Returns `CatalogError::Malformed` if a row does not match the expected columns.
pub fn parse_station_locations(
    content: &str,
    source: &str,
) -> Result<HashMap<u32, StationLocation>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut locations = HashMap::new();
    for row in reader.deserialize::<StationLocationRow>() {
        let row = row.map_err(|e| CatalogError::Malformed {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        locations.insert(
            row.id,
            StationLocation {
                name: row.description,
                canton: row.canton,
                east_lv95: row.east_lv95,
                north_lv95: row.north_lv95,
            },
        );
    }
    Ok(locations)
}

/// Parse the detector name table (`lcd;rnid;n1id;n2id;name`) keyed by location id.
///
/// # Errors
///
/// Returns `CatalogError::Malformed` if a row does not match the expected columns.
pub fn parse_detector_names(
    content: &str,
    source: &str,
) -> Result<HashMap<String, String>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut names = HashMap::new();
    for row in reader.deserialize::<DetectorNameRow>() {
        let row = row.map_err(|e| CatalogError::Malformed {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        names.insert(row.lcd, row.name);
    }
    Ok(names)
}

/// # Errors
///
/// Returns `CatalogError::MissingFile` if the file does not exist.
pub fn load_station_locations(path: &Path) -> Result<HashMap<u32, StationLocation>, CatalogError> {
    let content = read_required(path)?;
    parse_station_locations(&content, &path.display().to_string())
}

/// # Errors
///
/// Returns `CatalogError::MissingFile` if the file does not exist.
pub fn load_detector_names(path: &Path) -> Result<HashMap<String, String>, CatalogError> {
    let content = read_required(path)?;
    parse_detector_names(&content, &path.display().to_string())
}
