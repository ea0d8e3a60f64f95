//! In-memory fakes and fixture helpers shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use traffic_db::catalog::ReferenceCatalog;
use traffic_db::common::ReferenceData;
use traffic_db::datex::{enrich, mst, FeedDocument, FeedSource};
use traffic_db::error::{AppError, AppResult};
use traffic_db::influx::{FluxTable, StoredPoint, TimeSeriesStore};

pub const MST_SAMPLE: &[u8] = include_bytes!("../fixtures/mst_sample.xml");
pub const MSR_SAMPLE: &[u8] = include_bytes!("../fixtures/msr_sample.xml");

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

pub fn catalog() -> ReferenceCatalog {
    ReferenceCatalog::load(&fixture("mst_locations.csv"), &fixture("detector_names.csv")).unwrap()
}

/// Enriched sample stations with detector regions indexed.
pub fn reference() -> Arc<ReferenceData> {
    let catalog = catalog();
    let stations = mst::parse_site_table(MST_SAMPLE).unwrap();
    let stations = enrich::enrich_stations(stations, &catalog).unwrap();
    Arc::new(ReferenceData::new(catalog, stations))
}

#[derive(Debug, Clone)]
pub enum FeedReply {
    Document(Vec<u8>),
    Skip,
    Fail,
}

pub struct FakeFeed {
    site_table: FeedReply,
    measured_data: FeedReply,
    delay: Duration,
    fetches: AtomicUsize,
}

impl FakeFeed {
    pub fn new(measured_data: FeedReply) -> Self {
        Self {
            site_table: FeedReply::Document(MST_SAMPLE.to_vec()),
            measured_data,
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_site_table(mut self, site_table: FeedReply) -> Self {
        self.site_table = site_table;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl FeedSource for FakeFeed {
    async fn fetch(&self, document: FeedDocument) -> AppResult<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = match document {
            FeedDocument::SiteTable => &self.site_table,
            FeedDocument::MeasuredData => &self.measured_data,
        };
        match reply {
            FeedReply::Document(content) => Ok(Some(content.clone())),
            FeedReply::Skip => Ok(None),
            FeedReply::Fail => Err(AppError::Upstream("HTTP 503: unavailable".to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub tables: Vec<FluxTable>,
    pub fail_writes: bool,
    pub fail_queries: bool,
    pub writes: Mutex<Vec<Vec<StoredPoint>>>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn returning(tables: Vec<FluxTable>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn written(&self) -> Vec<Vec<StoredPoint>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl TimeSeriesStore for FakeStore {
    async fn write_points(&self, points: &[StoredPoint]) -> AppResult<()> {
        if self.fail_writes {
            return Err(AppError::Store("HTTP 401: unauthorized".to_string()));
        }
        self.writes.lock().unwrap().push(points.to_vec());
        Ok(())
    }

    async fn query(&self, flux: &str) -> AppResult<Vec<FluxTable>> {
        self.queries.lock().unwrap().push(flux.to_string());
        if self.fail_queries {
            return Err(AppError::Store("connection refused".to_string()));
        }
        Ok(self.tables.clone())
    }
}
