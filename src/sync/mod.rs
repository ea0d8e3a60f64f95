//! Periodic ingestion of measurement reports into the time-series store.

pub mod scheduler;
pub mod worker;

pub use scheduler::{IngestionScheduler, IngestionStatus};
pub use worker::{IngestionCycle, TickOutcome};
