//! URL handling for the crawl frontier
//!
//! This module turns discovered links into comparable frontier keys and
//! decides whether a key belongs to the crawl at all (host scope and
//! binary-resource filtering).

mod normalize;
mod scope;

pub use normalize::normalize;
pub use scope::HostScope;

use std::fmt;
use url::Url;

/// File extensions that name images or binary payloads rather than pages
const BINARY_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "tif", "tiff", "pdf", "zip", "gz",
    "rar", "7z", "exe", "dmg", "mp3", "mp4", "avi", "mov",
];

/// A normalized URL, the identity of a frontier entry
///
/// Keys can only be produced by [`normalize`], so two keys compare equal
/// exactly when their raw URLs differ only by fragment, trailing slash,
/// case of scheme/host, tracking parameters or query order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlKey(Url);

impl UrlKey {
    pub(crate) fn from_normalized(url: Url) -> Self {
        Self(url)
    }

    /// Returns the key as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the key as a parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the (lowercase) host of the key
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns true if the path ends with an image or binary extension
    pub fn is_binary_resource(&self) -> bool {
        let path = self.0.path();
        let last_segment = path.rsplit('/').next().unwrap_or("");
        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                BINARY_EXTENSIONS.contains(&ext.as_str())
            }
            _ => false,
        }
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
