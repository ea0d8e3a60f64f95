//! DATEX II feed handling: upstream client, site-table and measurement-report
//! parsers, and station enrichment.

pub mod client;
pub mod enrich;
pub mod msr;
pub mod mst;
pub mod xml;

use std::future::Future;

use crate::error::AppResult;

pub use client::DatexClient;

/// Schema URI of every element the parsers look at.
pub const DATEX_NS: &str = "http://datex2.eu/schema/2/2_0";

/// Only site records with this id prefix are in scope.
pub const NATIONAL_PREFIX: &str = "CH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedDocument {
    SiteTable,
    MeasuredData,
}

impl FeedDocument {
    #[must_use]
    pub fn soap_operation(self) -> &'static str {
        match self {
            Self::SiteTable => "pullMeasurementSiteTable",
            Self::MeasuredData => "pullMeasuredData",
        }
    }
}

/// Source of raw feed documents.
///
/// `Ok(None)` means the fetch was skipped (e.g. no credentials configured).
pub trait FeedSource: Send + Sync {
    fn fetch(
        &self,
        document: FeedDocument,
    ) -> impl Future<Output = AppResult<Option<Vec<u8>>>> + Send;
}

/// Structural failure that aborts a whole parse call.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Document does not use namespace {0}")]
    MissingNamespace(&'static str),

    #[error("No matching {0} nodes in document")]
    NoMatchingNodes(&'static str),

    #[error("Missing required element {element} in {context}")]
    MissingElement {
        context: String,
        element: &'static str,
    },

    #[error("Invalid value '{value}' for {field} in {context}")]
    InvalidValue {
        context: String,
        field: &'static str,
        value: String,
    },
}
