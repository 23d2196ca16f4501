//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use crawl_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawl.concurrency);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    BackoffKind, Config, ContentExpectation, CrawlConfig, FetchConfig, IdentityConfig,
    OutputConfig, PolitenessConfig, ResourceConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{resolve_host_scope, validate};
