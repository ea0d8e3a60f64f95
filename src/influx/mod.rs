//! InfluxDB 2.x access: line-protocol writes and Flux queries over HTTP.

pub mod client;
pub mod point;
pub mod response;

use std::future::Future;

use crate::error::AppResult;

pub use client::InfluxClient;
pub use point::{FieldValue, StoredPoint};
pub use response::{FluxRecord, FluxTable};

/// Write and query access to the time-series store.
pub trait TimeSeriesStore: Send + Sync {
    /// Write all points as one batch.
    fn write_points(&self, points: &[StoredPoint]) -> impl Future<Output = AppResult<()>> + Send;

    /// Run a Flux query and return its result tables in response order.
    fn query(&self, flux: &str) -> impl Future<Output = AppResult<Vec<FluxTable>>> + Send;
}
