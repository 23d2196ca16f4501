use crate::url::UrlKey;
use std::cmp::Ordering;
use std::time::Instant;

/// Highest priority an entry can carry
pub const MAX_PRIORITY: u8 = 10;

/// A URL accepted into the frontier
///
/// Entries are created on acceptance, never mutated, and consumed exactly
/// once by [`Frontier::dequeue_next`](crate::frontier::Frontier::dequeue_next).
#[derive(Debug, Clone)]
pub struct UrlEntry {
    /// The normalized URL, the identity of this entry
    pub key: UrlKey,

    /// Relevance score in `0..=10` (higher is fetched first)
    pub priority: u8,

    /// Discovery sequence number, strictly increasing per frontier
    pub discovered_seq: u64,

    /// Monotonic discovery time
    pub discovered_at: Instant,
}

// BinaryHeap is a max-heap: higher priority pops first, and within a
// priority tier the lower sequence number (older discovery) pops first.
impl Ord for UrlEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.discovered_seq.cmp(&self.discovered_seq))
    }
}

impl PartialOrd for UrlEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for UrlEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.discovered_seq == other.discovered_seq
    }
}

impl Eq for UrlEntry {}
