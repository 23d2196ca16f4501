use crate::url::UrlKey;
use crate::UrlError;
use url::Url;

/// The host filter restricting a crawl to one domain
///
/// Two pattern forms are accepted:
/// 1. Exact: `"example.com"` admits only `example.com`
/// 2. Wildcard: `"*.example.com"` admits `example.com` and any subdomain
///
/// A full URL such as `"https://example.com/start"` is also accepted and
/// reduced to an exact pattern on its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostScope {
    pattern: String,
}

impl HostScope {
    /// Parses a scope pattern
    ///
    /// # Examples
    ///
    /// ```
    /// use crawl_frontier::url::HostScope;
    ///
    /// let scope = HostScope::parse("*.example.com").unwrap();
    /// assert!(scope.contains_host("blog.example.com"));
    /// assert!(!scope.contains_host("example.org"));
    /// ```
    pub fn parse(spec: &str) -> Result<Self, UrlError> {
        let spec = spec.trim();
        if spec.contains("://") {
            let url = Url::parse(spec).map_err(|e| UrlError::Parse(e.to_string()))?;
            let host = url.host_str().ok_or(UrlError::MissingDomain)?;
            return Self::from_pattern(host);
        }
        Self::from_pattern(spec)
    }

    /// Builds an exact scope for the host of a URL
    pub fn for_url(url: &Url) -> Result<Self, UrlError> {
        let host = url.host_str().ok_or(UrlError::MissingDomain)?;
        Self::from_pattern(host)
    }

    fn from_pattern(pattern: &str) -> Result<Self, UrlError> {
        let pattern = pattern.to_lowercase();
        let domain = pattern.strip_prefix("*.").unwrap_or(&pattern);

        if domain.is_empty() {
            return Err(UrlError::Malformed(
                "host scope cannot be empty".to_string(),
            ));
        }

        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(UrlError::Malformed(format!(
                "host scope '{}' contains invalid characters",
                pattern
            )));
        }

        if domain.starts_with('.')
            || domain.ends_with('.')
            || domain.starts_with('-')
            || domain.ends_with('-')
            || domain.contains("..")
        {
            return Err(UrlError::Malformed(format!(
                "host scope '{}' is not a valid host name",
                pattern
            )));
        }

        Ok(Self { pattern })
    }

    /// Returns the pattern as given (lowercased)
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Checks whether a host falls inside this scope
    pub fn contains_host(&self, host: &str) -> bool {
        matches_wildcard(&self.pattern, &host.to_lowercase())
    }

    /// Checks whether a normalized key falls inside this scope
    pub fn admits(&self, key: &UrlKey) -> bool {
        key.host().is_some_and(|host| self.contains_host(host))
    }
}

/// Checks if a domain matches a wildcard pattern
///
/// `"*.example.com"` matches the bare domain and any subdomain depth;
/// any other pattern is an exact match.
fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
