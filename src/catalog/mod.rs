//! Static reference data: station locations, detector display names and the
//! detector to region mapping.
//!
//! The catalog is assembled once at startup and then shared read-only through
//! [`crate::common::ReferenceData`].

pub mod coordinates;
pub mod loader;

use std::collections::HashMap;
use std::path::Path;

use crate::entity::Station;

pub use coordinates::{lv95_to_wgs84, LonLat};

#[derive(Debug, Clone, PartialEq)]
pub struct StationLocation {
    pub name: String,
    pub canton: String,
    pub east_lv95: i64,
    pub north_lv95: i64,
}

#[derive(Debug, Default, Clone)]
pub struct ReferenceCatalog {
    station_locations: HashMap<u32, StationLocation>,
    detector_names: HashMap<String, String>,
    detector_regions: HashMap<String, String>,
}

impl ReferenceCatalog {
    #[must_use]
    pub fn new(
        station_locations: HashMap<u32, StationLocation>,
        detector_names: HashMap<String, String>,
    ) -> Self {
        Self {
            station_locations,
            detector_names,
            detector_regions: HashMap::new(),
        }
    }

    /// Load both reference tables from disk.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::MissingFile` if either file is absent, or
    /// `CatalogError::Malformed` if a row cannot be read.
    pub fn load(locations_path: &Path, detector_names_path: &Path) -> Result<Self, CatalogError> {
        let station_locations = loader::load_station_locations(locations_path)?;
        let detector_names = loader::load_detector_names(detector_names_path)?;

        tracing::info!(
            stations = station_locations.len(),
            detector_names = detector_names.len(),
            "Reference catalog loaded"
        );

        Ok(Self::new(station_locations, detector_names))
    }

    /// Record the region of every detector of the given (enriched) stations.
    pub fn index_detector_regions(&mut self, stations: &[Station]) {
        self.detector_regions = stations
            .iter()
            .flat_map(|s| s.detectors.iter().map(|d| (d.id.clone(), s.canton.clone())))
            .collect();
        tracing::debug!(detectors = self.detector_regions.len(), "Indexed detector regions");
    }

    #[must_use]
    pub fn station_location(&self, number_id: u32) -> Option<&StationLocation> {
        self.station_locations.get(&number_id)
    }

    #[must_use]
    pub fn detector_name(&self, location_id: i64) -> Option<&str> {
        self.detector_names
            .get(&location_id.to_string())
            .map(String::as_str)
    }

    #[must_use]
    pub fn detector_region(&self, detector_id: &str) -> Option<&str> {
        self.detector_regions.get(detector_id).map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Expected file '{0}' but it was not found")]
    MissingFile(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed row in '{path}': {reason}")]
    Malformed { path: String, reason: String },
}
