//! Sink trait and the records it receives
//!
//! A sink persists or reports terminal frontier items. It gets exactly one
//! record per completed item, success or failure, in completion order.

use crate::output::stats::CrawlStatistics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors that can occur while recording results
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Final outcome of one frontier item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutcome {
    Succeeded {
        status: u16,
        content_type: Option<String>,
    },
    Failed {
        reason: String,
    },
    /// Cancelled while in flight
    Aborted,
}

impl FinalOutcome {
    /// Short label used in logs and the database
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One terminal frontier item
#[derive(Debug, Clone)]
pub struct CrawlRecord {
    /// The normalized URL that was dequeued
    pub url: Url,
    pub outcome: FinalOutcome,
    /// Attempts issued, including the first
    pub attempts: u32,
    /// Page body for successful fetches
    pub body: Option<Vec<u8>>,
    pub completed_at: DateTime<Utc>,
}

/// Receives the stream of terminal outcomes
#[async_trait]
pub trait Sink: Send + Sync {
    /// Records one terminal item
    async fn record(&self, record: CrawlRecord) -> SinkResult<()>;

    /// Called once after the last record, with the run statistics
    async fn finish(&self, _stats: &CrawlStatistics) -> SinkResult<()> {
        Ok(())
    }
}
