use std::collections::BTreeSet;
use std::sync::Arc;

use crate::catalog::ReferenceCatalog;
use crate::config::Config;
use crate::datex::DatexClient;
use crate::entity::Station;
use crate::influx::InfluxClient;
use crate::query::{QueryService, RegionFilter};
use crate::sync::IngestionScheduler;

/// Reference catalog plus the enriched station list.
///
/// Built once at startup and shared read-only by the parsers, the ingestion
/// cycle and the query service.
#[derive(Debug, Default)]
pub struct ReferenceData {
    pub catalog: ReferenceCatalog,
    pub stations: Vec<Station>,
}

impl ReferenceData {
    /// Index detector regions from the stations and freeze both.
    #[must_use]
    pub fn new(mut catalog: ReferenceCatalog, stations: Vec<Station>) -> Self {
        catalog.index_detector_regions(&stations);
        Self { catalog, stations }
    }

    /// Distinct regions of the station list, sorted.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        self.stations
            .iter()
            .map(|s| s.canton.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn stations_in(&self, region: &RegionFilter) -> Vec<Station> {
        self.stations
            .iter()
            .filter(|s| region.matches(&s.canton))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn detector_name(&self, detector_id: &str) -> Option<String> {
        self.stations
            .iter()
            .flat_map(|s| s.detectors.iter())
            .find(|d| d.id == detector_id)
            .and_then(|d| d.name.clone())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reference: Arc<ReferenceData>,
    pub queries: Arc<QueryService<InfluxClient>>,
    pub ingestion: Arc<IngestionScheduler<DatexClient, InfluxClient>>,
}

impl AppState {
    pub fn new(
        config: Config,
        reference: Arc<ReferenceData>,
        queries: QueryService<InfluxClient>,
        ingestion: Arc<IngestionScheduler<DatexClient, InfluxClient>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            reference,
            queries: Arc::new(queries),
            ingestion,
        }
    }
}
