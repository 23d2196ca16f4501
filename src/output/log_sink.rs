//! Sink that reports through `tracing`

use crate::output::stats::CrawlStatistics;
use crate::output::traits::{CrawlRecord, FinalOutcome, Sink, SinkResult};
use async_trait::async_trait;

/// Logs one line per record and a summary at the end; stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn record(&self, record: CrawlRecord) -> SinkResult<()> {
        let bytes = record.body.as_ref().map_or(0, Vec::len);
        match &record.outcome {
            FinalOutcome::Succeeded {
                status,
                content_type,
            } => tracing::info!(
                url = %record.url,
                status,
                content_type = content_type.as_deref().unwrap_or("-"),
                attempts = record.attempts,
                bytes,
                "Fetched"
            ),
            FinalOutcome::Failed { reason } => tracing::warn!(
                url = %record.url,
                attempts = record.attempts,
                reason = %reason,
                "Failed"
            ),
            FinalOutcome::Aborted => tracing::info!(url = %record.url, "Aborted"),
        }
        Ok(())
    }

    async fn finish(&self, stats: &CrawlStatistics) -> SinkResult<()> {
        tracing::info!(
            succeeded = stats.pages_succeeded,
            failed = stats.pages_failed,
            aborted = stats.pages_aborted,
            accepted = stats.urls_accepted,
            rejected = stats.rejections.total(),
            budget_pauses = stats.budget_pauses,
            "Crawl summary: {:.1}% success rate",
            stats.success_rate()
        );
        Ok(())
    }
}
