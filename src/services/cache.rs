//! Short-lived cache of Flux query results.
//!
//! Query results only change when the ingestion cycle writes a new batch, so
//! identical requests within a short TTL (typically shorter than the ingestion
//! interval) are served from memory. Entries are weighted by an estimate of
//! their row count to bound memory use.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::influx::FluxTable;

/// Upper bound on cached rows across all entries.
const MAX_CACHED_ROWS: u64 = 200_000;

#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<String, Arc<Vec<FluxTable>>>,
}

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
#[must_use]
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

impl QueryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .weigher(|_key: &String, value: &Arc<Vec<FluxTable>>| -> u32 {
                let rows: usize = value.iter().map(|t| t.records.len()).sum();
                rows.max(1).try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(MAX_CACHED_ROWS)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<FluxTable>>> {
        let hit = self.inner.get(key).await;
        if hit.is_some() {
            tracing::debug!(cache_key = %key, "cache_hit");
        }
        hit
    }

    pub async fn insert(&self, key: String, tables: Arc<Vec<FluxTable>>) {
        tracing::debug!(cache_key = %key, tables = tables.len(), "cache_stored");
        self.inner.insert(key, tables).await;
    }

    /// Drop every entry, e.g. after a new batch was written.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        tracing::debug!("cache_invalidated");
    }
}
