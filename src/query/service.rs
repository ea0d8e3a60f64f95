use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::builder::{
    self, BinSize, FluxQuery, GroupKey, QueryScope, RangeStart, RegionFilter, ResultShape,
    ALL_REGIONS,
};
use super::mapper::{
    self, DetectorSeries, GroupMean, RegionErrorCount, RegionErrorSeries, StationErrorCount,
};
use crate::common::ReferenceData;
use crate::entity::MeasurementKind;
use crate::error::AppResult;
use crate::influx::{FluxTable, TimeSeriesStore};
use crate::services::cache::{cache_key, QueryCache};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegionOption {
    pub label: String,
    pub value: String,
}

/// One detector channel whose history is requested.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SeriesRequest {
    pub id: String,
    pub index: u32,
}

/// Builds queries from request parameters, runs them against the store and
/// maps the results onto response shapes.
pub struct QueryService<S> {
    store: Arc<S>,
    reference: Arc<ReferenceData>,
    scope: QueryScope,
    cache: QueryCache,
    default_time_range: String,
}

impl<S: TimeSeriesStore> QueryService<S> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        reference: Arc<ReferenceData>,
        scope: QueryScope,
        cache: QueryCache,
        default_time_range: String,
    ) -> Self {
        Self {
            store,
            reference,
            scope,
            cache,
            default_time_range,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Requested range start, or the default when absent or blank.
    fn time_range<'a>(&'a self, time: Option<&'a str>) -> &'a str {
        time.map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.default_time_range)
    }

    fn range_start(&self, time: Option<&str>) -> AppResult<RangeStart> {
        RangeStart::parse(self.time_range(time))
    }

    async fn run(&self, query: &FluxQuery) -> AppResult<Arc<Vec<FluxTable>>> {
        let shape = match query.shape {
            ResultShape::Rows => "rows",
            ResultShape::Tables => "tables",
        };
        let key = cache_key("flux", &[shape, &query.text]);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let tables = Arc::new(self.store.query(&query.text).await?);
        self.cache.insert(key, tables.clone()).await;
        Ok(tables)
    }

    /// Region options for filters: "all" first, then every known region.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionOption> {
        std::iter::once(RegionOption {
            label: "All Cantons".to_string(),
            value: ALL_REGIONS.to_string(),
        })
        .chain(self.reference.regions().into_iter().map(|r| RegionOption {
            label: r.clone(),
            value: r,
        }))
        .collect()
    }

    /// Stations of a region (or all) with their error counts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid time range, or
    /// `AppError::Store` if the query fails.
    pub async fn stations_with_errors(
        &self,
        region: Option<&str>,
        time: Option<&str>,
    ) -> AppResult<Vec<StationErrorCount>> {
        let region = RegionFilter::from_param(region);
        let start = self.range_start(time)?;

        let stations = self.reference.stations_in(&region);
        if stations.is_empty() {
            return Ok(Vec::new());
        }

        let query = builder::error_counts(&self.scope, &region, &start, GroupKey::Station);
        let tables = self.run(&query).await?;
        Ok(mapper::map_station_errors(&stations, &tables))
    }

    /// Error totals per region (or for a single region).
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid time range, or
    /// `AppError::Store` if the query fails.
    pub async fn region_error_totals(
        &self,
        region: Option<&str>,
        time: Option<&str>,
    ) -> AppResult<Vec<RegionErrorCount>> {
        let region = RegionFilter::from_param(region);
        let start = self.range_start(time)?;

        let regions: Vec<String> = self
            .reference
            .regions()
            .into_iter()
            .filter(|r| region.matches(r))
            .collect();
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let query = builder::error_counts(&self.scope, &region, &start, GroupKey::Region);
        let tables = self.run(&query).await?;
        Ok(mapper::map_region_errors(&regions, &tables))
    }

    /// Error counts per region and time bin.
    ///
    /// The region is required here: an absent or empty region yields an empty
    /// result. Without a bin size, the preset for the time range is used.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid time range or bin size,
    /// or `AppError::Store` if the query fails.
    pub async fn region_error_bins(
        &self,
        region: Option<&str>,
        time: Option<&str>,
        bin_size: Option<&str>,
    ) -> AppResult<Vec<RegionErrorSeries>> {
        if region.is_none_or(|r| r.trim().is_empty()) {
            return Ok(Vec::new());
        }
        let region = RegionFilter::from_param(region);
        let start = self.range_start(time)?;
        let bin_size = match bin_size.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => BinSize::parse(b)?,
            None => BinSize::for_time_range(self.time_range(time)),
        };

        let query = builder::error_bins(&self.scope, &region, &start, &bin_size);
        let tables = self.run(&query).await?;
        Ok(mapper::map_region_error_bins(&tables))
    }

    /// Mean value of one measurement kind, per station when a region is
    /// given and per region otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid time range, or
    /// `AppError::Store` if the query fails.
    pub async fn mean_values(
        &self,
        region: Option<&str>,
        time: Option<&str>,
        kind: MeasurementKind,
    ) -> AppResult<Vec<GroupMean>> {
        let region = RegionFilter::from_param(region);
        let start = self.range_start(time)?;

        let (group, keys) = match &region {
            RegionFilter::All => (GroupKey::Region, self.reference.regions()),
            RegionFilter::Region(_) => (
                GroupKey::Station,
                self.reference
                    .stations_in(&region)
                    .into_iter()
                    .map(|s| s.id)
                    .collect(),
            ),
        };
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let query = builder::mean_values(&self.scope, &region, &start, kind, group);
        let tables = self.run(&query).await?;
        Ok(mapper::map_group_means(&keys, group.column(), &tables))
    }

    /// Stored history of each requested detector channel, in request order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid time range, or
    /// `AppError::Store` if any query fails.
    pub async fn detector_series(
        &self,
        requests: &[SeriesRequest],
        time: Option<&str>,
    ) -> AppResult<Vec<DetectorSeries>> {
        let start = self.range_start(time)?;

        let mut result = Vec::with_capacity(requests.len());
        for request in requests {
            let query = builder::detector_series(&self.scope, &request.id, request.index, &start);
            let tables = self.run(&query).await?;
            result.push(mapper::map_detector_series(
                &request.id,
                request.index,
                self.reference.detector_name(&request.id),
                &tables,
            ));
        }
        Ok(result)
    }
}
