use crate::config::types::{Config, CrawlConfig, FetchConfig, IdentityConfig, ResourceConfig};
use crate::url::HostScope;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_fetch_config(&config.fetch)?;
    validate_identity_config(&config.identity)?;
    validate_resource_config(&config.resources)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Resolves the host scope, falling back to the first seed's host
pub fn resolve_host_scope(config: &CrawlConfig) -> Result<HostScope, ConfigError> {
    match &config.host_scope {
        Some(pattern) => HostScope::parse(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e))),
        None => {
            let first = config.seeds.first().ok_or_else(|| {
                ConfigError::Validation("at least one seed URL is required".to_string())
            })?;
            let url = Url::parse(first).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", first, e))
            })?;
            HostScope::for_url(&url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", first, e)))
        }
    }
}

/// Validates frontier and orchestration settings
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    let scope = resolve_host_scope(config)?;

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }

        let in_scope = url.host_str().is_some_and(|host| scope.contains_host(host));
        if !in_scope {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' is outside host scope '{}'",
                seed,
                scope.pattern()
            )));
        }
    }

    if config.max_frontier_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max_frontier_size must be >= 1, got {}",
            config.max_frontier_size
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    Ok(())
}

/// Validates fetch executor settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Validates identity configuration
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    if config.rotate.iter().any(|agent| agent.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "rotate must not contain empty user agents".to_string(),
        ));
    }

    Ok(())
}

/// Validates resource budget settings
fn validate_resource_config(config: &ResourceConfig) -> Result<(), ConfigError> {
    if config.budget_bytes == 0 {
        return Err(ConfigError::Validation(
            "budget_bytes must be greater than zero".to_string(),
        ));
    }

    if !(config.threshold > 0.0 && config.threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "threshold must be in (0, 1], got {}",
            config.threshold
        )));
    }

    if config.check_every == 0 {
        return Err(ConfigError::Validation(
            "check_every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
