//! Traffic DB - Road-sensor telemetry ingestion and error analytics for the
//! Swiss DATEX II feed
//!
//! This library exposes the core modules for testing and reuse.

pub mod catalog;
pub mod common;
pub mod config;
pub mod datex;
pub mod entity;
pub mod error;
pub mod influx;
pub mod query;
pub mod routes;
pub mod services;
pub mod sync;
