use crate::url::UrlKey;
use crate::UrlError;
use url::{ParseError, Url};

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Canonicalizes a discovered link into a frontier key
///
/// # Normalization Steps
///
/// 1. Reject empty input and `javascript:` pseudo-links
/// 2. Resolve against `base` when given; otherwise fix up a missing scheme
///    (`//host/path` and `host.tld/path` both become `https://...`)
/// 3. Accept only `http` and `https`
/// 4. Lowercase the scheme and host
/// 5. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 6. Remove fragment (everything after #)
/// 7. Remove tracking query parameters and sort the remaining ones
/// 8. Remove empty query string (trailing ?)
///
/// The result is a fixed point: normalizing a key's string again yields the
/// same key.
///
/// # Examples
///
/// ```
/// use crawl_frontier::url::normalize;
///
/// let key = normalize("HTTPS://Example.COM/gallery/#top", None).unwrap();
/// assert_eq!(key.as_str(), "https://example.com/gallery");
///
/// let base = url::Url::parse("https://example.com/a/b").unwrap();
/// let key = normalize("../c/", Some(&base)).unwrap();
/// assert_eq!(key.as_str(), "https://example.com/c");
/// ```
pub fn normalize(raw: &str, base: Option<&Url>) -> Result<UrlKey, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    if trimmed
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
    {
        return Err(UrlError::PseudoProtocol(trimmed.to_string()));
    }

    let mut url = match base {
        Some(base) => base
            .join(trimmed)
            .map_err(|e| UrlError::Parse(e.to_string()))?,
        None => parse_with_scheme_fixup(trimmed)?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(UrlKey::from_normalized(url))
}

/// Parses an absolute URL, adding `https:` when the scheme was left off
fn parse_with_scheme_fixup(raw: &str) -> Result<Url, UrlError> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let fixed = if raw.starts_with("//") {
                format!("https:{}", raw)
            } else if raw.starts_with('/') || raw.starts_with('.') || raw.starts_with('?') {
                return Err(UrlError::Parse(format!(
                    "relative URL without a base: {}",
                    raw
                )));
            } else {
                format!("https://{}", raw)
            };
            Url::parse(&fixed).map_err(|e| UrlError::Parse(e.to_string()))
        }
        Err(e) => Err(UrlError::Parse(e.to_string())),
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
