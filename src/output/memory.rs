//! In-memory sink

use crate::output::stats::CrawlStatistics;
use crate::output::traits::{CrawlRecord, Sink, SinkResult};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Collects every record in memory
///
/// Used by library callers that post-process results themselves, and by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CrawlRecord>>,
    finished: Mutex<Option<CrawlStatistics>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in completion order
    pub fn records(&self) -> Vec<CrawlRecord> {
        lock(&self.records).clone()
    }

    /// Statistics passed to `finish`, if it was called
    pub fn finished(&self) -> Option<CrawlStatistics> {
        lock(&self.finished).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Sink for MemorySink {
    async fn record(&self, record: CrawlRecord) -> SinkResult<()> {
        lock(&self.records).push(record);
        Ok(())
    }

    async fn finish(&self, stats: &CrawlStatistics) -> SinkResult<()> {
        *lock(&self.finished) = Some(stats.clone());
        Ok(())
    }
}
