//! Relevance scoring for discovered links

use crate::config::CrawlConfig;
use crate::frontier::MAX_PRIORITY;

const BASE_PRIORITY: u8 = 5;
const KEYWORD_BONUS: u8 = 3;
const SHALLOW_BONUS: u8 = 2;
const IMAGE_BONUS: u8 = 2;

/// Context an extractor attaches to a candidate link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkContext {
    /// Anchor text and any surrounding text the extractor considers relevant
    pub anchor_text: String,

    /// Structural depth of the link element below the document root
    pub depth: usize,

    /// Whether the link wraps or sits next to an image
    pub near_image: bool,
}

/// Computes link priorities
///
/// Base 5, +3 for a keyword match, +2 for a shallow link, +2 next to an
/// image, clamped to `0..=10`.
#[derive(Debug, Clone)]
pub struct PriorityPolicy {
    keywords: Vec<String>,
    shallow_depth: usize,
}

impl PriorityPolicy {
    pub fn new(keywords: &[String], shallow_depth: usize) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            shallow_depth,
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(&config.keywords, config.shallow_depth)
    }

    pub fn compute(&self, context: &LinkContext) -> u8 {
        let mut priority = BASE_PRIORITY;

        if self.matches_keyword(&context.anchor_text) {
            priority += KEYWORD_BONUS;
        }
        if context.depth < self.shallow_depth {
            priority += SHALLOW_BONUS;
        }
        if context.near_image {
            priority += IMAGE_BONUS;
        }

        priority.min(MAX_PRIORITY)
    }

    fn matches_keyword(&self, text: &str) -> bool {
        if self.keywords.is_empty() || text.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}
