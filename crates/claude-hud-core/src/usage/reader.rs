//! Rate-limited, single-flight access to usage data.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::fetcher::{ProcessUsageSource, UsageSource};
use super::parser::parse_usage_output;
use super::types::UsageData;
use crate::cache::Memo;
use crate::config::UsageConfig;

/// Caches usage data for a minimum interval between fetches
pub struct UsageReader<S = ProcessUsageSource> {
    source: S,
    memo: Memo<UsageData, Instant>,
    min_interval: Duration,
}

impl UsageReader<ProcessUsageSource> {
    pub fn from_config(config: &UsageConfig) -> Self {
        Self::new(
            ProcessUsageSource::from_config(config),
            Duration::from_millis(config.min_interval_ms),
        )
    }
}

impl<S: UsageSource> UsageReader<S> {
    pub fn new(source: S, min_interval: Duration) -> Self {
        Self {
            source,
            memo: Memo::new(),
            min_interval,
        }
    }

    /// Current usage data.
    ///
    /// A value younger than the minimum interval is returned without
    /// fetching. While another fetch is outstanding the current cache is
    /// returned immediately. A failed or unparseable fetch leaves the cache
    /// as it was and returns it.
    pub async fn read(&self) -> Option<Arc<UsageData>> {
        if let Some(hit) = self.memo.fresh(|at| at.elapsed() < self.min_interval) {
            return Some(hit);
        }

        let Some(_flight) = self.memo.begin_flight() else {
            debug!("Usage fetch already in flight");
            return self.memo.cached();
        };

        let started = Instant::now();
        match self.source.fetch().await {
            Ok(text) => match parse_usage_output(&text) {
                Some(usage) => return Some(self.memo.store(usage, started)),
                None => debug!("Usage output not recognized"),
            },
            Err(e) => debug!("Usage fetch failed: {}", e),
        }

        self.memo.cached()
    }

    /// Last successfully fetched value, without fetching
    pub fn cached(&self) -> Option<Arc<UsageData>> {
        self.memo.cached()
    }

    /// Whether a fetch is currently outstanding
    pub fn is_fetching(&self) -> bool {
        self.memo.is_in_flight()
    }

    /// Drop the cached value so the next read fetches
    pub fn invalidate(&self) {
        self.memo.invalidate();
    }
}
