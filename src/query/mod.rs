//! Aggregate queries over the stored detector history.

pub mod builder;
pub mod mapper;
pub mod service;

pub use builder::{
    BinSize, FluxQuery, GroupKey, QueryScope, RangeStart, RegionFilter, ResultShape, ALL_REGIONS,
};
pub use service::{QueryService, SeriesRequest};
