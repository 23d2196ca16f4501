//! Link extraction from fetched pages
//!
//! The frontier never looks at page content; an `Extractor` turns a fetched
//! page into candidate links with context hints for the priority policy.
//! `HtmlLinkExtractor` is the default implementation.

use crate::crawler::fetcher::FetchedPage;
use crate::crawler::priority::LinkContext;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Extraction failed: {0}")]
    Failed(String),
}

/// A link found on a page, not yet normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Raw href, possibly relative to the page URL
    pub candidate: String,
    pub hint: LinkContext,
}

/// Turns a fetched page into candidate links
pub trait Extractor: Send + Sync {
    fn extract(&self, page: &FetchedPage) -> Result<Vec<DiscoveredLink>, ExtractError>;
}

/// Extracts `<a href>` links from HTML pages
///
/// # Link Extraction Rules
///
/// **Include:**
/// - every `<a href="...">`, including `rel="nofollow"`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - empty and fragment-only hrefs
/// - pages whose content type is not HTML
///
/// Pseudo-protocol and off-host links are passed through; the frontier
/// rejects them and counts the rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor;

impl Extractor for HtmlLinkExtractor {
    fn extract(&self, page: &FetchedPage) -> Result<Vec<DiscoveredLink>, ExtractError> {
        if !is_html(page.content_type.as_deref()) {
            return Ok(Vec::new());
        }

        let document = Html::parse_document(&page.text());
        extract_links(&document)
    }
}

fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        }
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

fn extract_links(document: &Html) -> Result<Vec<DiscoveredLink>, ExtractError> {
    let anchors = selector("a[href]")?;
    let images = selector("img")?;
    let mut links = Vec::new();

    for element in document.select(&anchors) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        links.push(DiscoveredLink {
            candidate: href.to_string(),
            hint: LinkContext {
                anchor_text: anchor_text(&element),
                depth: element_depth(&element),
                near_image: element.select(&images).next().is_some()
                    || has_image_sibling(&element),
            },
        });
    }

    Ok(links)
}

/// Visible text plus the `title` attribute, whitespace-collapsed
fn anchor_text(element: &ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = element.text().flat_map(str::split_whitespace).collect();
    if let Some(title) = element.value().attr("title") {
        parts.extend(title.split_whitespace());
    }
    parts.join(" ")
}

/// Number of element ancestors
fn element_depth(element: &ElementRef<'_>) -> usize {
    element
        .ancestors()
        .filter(|node| node.value().is_element())
        .count()
}

fn has_image_sibling(element: &ElementRef<'_>) -> bool {
    let is_img = |sibling: Option<ElementRef<'_>>| {
        sibling.is_some_and(|e| e.value().name().eq_ignore_ascii_case("img"))
    };
    is_img(element.prev_siblings().find_map(ElementRef::wrap))
        || is_img(element.next_siblings().find_map(ElementRef::wrap))
}
