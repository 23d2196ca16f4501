use serde::Deserialize;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Frontier and orchestration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// URLs the crawl starts from
    pub seeds: Vec<String>,

    /// Host filter ("example.com" or "*.example.com"); defaults to the first seed's host
    #[serde(default)]
    pub host_scope: Option<String>,

    /// Maximum number of URLs accepted into the frontier
    #[serde(default = "default_max_frontier_size")]
    pub max_frontier_size: usize,

    /// Number of concurrent fetch workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Priority given to seed URLs
    #[serde(default = "default_seed_priority")]
    pub seed_priority: u8,

    /// Topical keywords that raise a link's priority
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Links with fewer ancestor elements than this are considered shallow
    #[serde(default = "default_shallow_depth")]
    pub shallow_depth: usize,
}

/// Backoff variant between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Content type a fetch is expected to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentExpectation {
    Any,
    Html,
    Image,
}

/// Fetch executor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Total attempts per URL, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,

    /// Base backoff delay (milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to exponential backoff (milliseconds)
    #[serde(default = "default_backoff_jitter_ms")]
    pub jitter_ms: u64,

    /// Per-request timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_expect")]
    pub expect: ContentExpectation,
}

/// Identity presented to servers
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityConfig {
    #[serde(default = "default_crawler_name")]
    pub crawler_name: String,

    #[serde(default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(default)]
    pub contact_url: Option<String>,

    /// User-agent strings rotated per attempt; overrides the crawler identity
    #[serde(default)]
    pub rotate: Vec<String>,
}

/// Inter-request delay settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolitenessConfig {
    /// Minimum delay before every fetch (milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Width of the random window added to the minimum delay (milliseconds)
    #[serde(default = "default_politeness_jitter_ms")]
    pub jitter_ms: u64,
}

/// Resource budget settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceConfig {
    /// Resource budget (bytes)
    #[serde(default = "default_budget_bytes")]
    pub budget_bytes: u64,

    /// Fraction of the budget above which ingestion pauses
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Check the budget every N dequeues
    #[serde(default = "default_check_every")]
    pub check_every: u64,

    /// Wait after a reclaim request before re-checking (milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Pause cycles before resuming in degraded mode
    #[serde(default = "default_max_pause_cycles")]
    pub max_pause_cycles: u32,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file; records are only logged when unset
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: default_backoff(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_backoff_jitter_ms(),
            timeout_ms: default_timeout_ms(),
            expect: default_expect(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
            rotate: Vec::new(),
        }
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            jitter_ms: default_politeness_jitter_ms(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            budget_bytes: default_budget_bytes(),
            threshold: default_threshold(),
            check_every: default_check_every(),
            grace_period_ms: default_grace_period_ms(),
            max_pause_cycles: default_max_pause_cycles(),
        }
    }
}

fn default_max_frontier_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

fn default_seed_priority() -> u8 {
    10
}

fn default_shallow_depth() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> BackoffKind {
    BackoffKind::Linear
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_backoff_jitter_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_expect() -> ContentExpectation {
    ContentExpectation::Html
}

fn default_crawler_name() -> String {
    "crawl-frontier".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_min_delay_ms() -> u64 {
    1_000
}

fn default_politeness_jitter_ms() -> u64 {
    2_000
}

fn default_budget_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_threshold() -> f64 {
    0.9
}

fn default_check_every() -> u64 {
    1
}

fn default_grace_period_ms() -> u64 {
    1_000
}

fn default_max_pause_cycles() -> u32 {
    5
}
