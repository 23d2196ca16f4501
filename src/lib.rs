//! Crawl-Frontier: a bounded, polite crawl frontier
//!
//! This crate decides in what order and at what rate a growing set of
//! discovered URLs gets fetched. It enforces host scoping, deduplication,
//! a hard size cap, retry-with-backoff on transient failures and a resource
//! budget that applies backpressure. Page content extraction and the
//! persistence of results are pluggable collaborators.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for a crawl run
///
/// Per-URL failures never show up here: they are recorded against the URL
/// and handed to the sink. Only setup errors and cancellation stop a run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] output::SinkError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl aborted after {completed} completed URLs")]
    Aborted { completed: u64 },

    #[error("Crawl run already started")]
    AlreadyStarted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Empty URL")]
    Empty,

    #[error("Pseudo-protocol link: {0}")]
    PseudoProtocol(String),

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlPhase};
pub use frontier::{Frontier, Rejection, ScopeViolation, UrlEntry};
pub use url::{normalize, HostScope, UrlKey};
