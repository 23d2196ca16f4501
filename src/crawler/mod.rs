//! Crawler module: everything between the frontier and the sink
//!
//! This module contains the core crawling logic, including:
//! - Fetching with retry and backoff over a pluggable transport
//! - Politeness delays and the resource budget
//! - Link extraction and priority scoring
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod politeness;
mod priority;
mod retry;

pub use coordinator::{Coordinator, CoordinatorBuilder, CrawlPhase};
pub use extractor::{DiscoveredLink, ExtractError, Extractor, HtmlLinkExtractor};
pub use fetcher::{
    build_http_client, AttemptOutcome, FailureReason, FetchAttempt, FetchExecutor, FetchOutcome,
    FetchReport, FetchedPage, HttpTransport, IdentityPool, Transport, TransportError,
    TransportErrorKind, TransportRequest, TransportResponse,
};
pub use politeness::{
    BudgetStatus, PolitenessGovernor, ProcessMemorySampler, ResourceSample, ResourceSampler,
};
pub use priority::{LinkContext, PriorityPolicy};
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::output::CrawlStatistics;
use crate::CrawlError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl with the default collaborators
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `cancel` - Stops the crawl when cancelled; finished results are still flushed
///
/// # Example
///
/// ```no_run
/// use crawl_frontier::config::load_config_with_hash;
/// use crawl_frontier::crawler::crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("crawl.toml"))?;
/// let stats = crawl(config, &hash, CancellationToken::new()).await?;
/// println!("{} pages fetched", stats.pages_succeeded);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<CrawlStatistics, CrawlError> {
    Coordinator::builder(config)
        .config_hash(config_hash)
        .build()?
        .run(cancel)
        .await
}
