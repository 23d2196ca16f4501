use crate::frontier::entry::{UrlEntry, MAX_PRIORITY};
use crate::url::{normalize, HostScope, UrlKey};
use crate::UrlError;
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;
use thiserror::Error;
use url::Url;

/// Why a candidate URL was turned away
///
/// Rejections are part of normal operation: they are counted and logged,
/// never propagated as failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("key already queued, in flight or visited")]
    DuplicateKey,

    #[error("frontier capacity reached")]
    CapacityReached,

    #[error("out of scope: {0}")]
    OutOfScope(ScopeViolation),
}

/// The kinds of out-of-scope candidates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeViolation {
    #[error("host outside the crawl scope")]
    ForeignHost,

    #[error("image or binary resource")]
    BinaryResource,

    #[error("{0}")]
    Invalid(UrlError),
}

/// The bounded, deduplicated, priority-ordered set of URLs awaiting fetch
///
/// Every key lives in at most one of three places: the pending queue
/// (indexed by `queued`), `in_flight` after a dequeue, or `visited` after
/// completion. Membership checks go through the sets, never the heap.
///
/// `Frontier` itself is not synchronized; concurrent callers share it
/// behind a single mutex so each operation is one short critical section.
#[derive(Debug)]
pub struct Frontier {
    /// Pending entries, highest priority first
    queue: BinaryHeap<UrlEntry>,

    /// Keys currently in `queue`
    queued: HashSet<UrlKey>,

    /// Keys handed out by `dequeue_next` and not yet marked visited
    in_flight: HashSet<UrlKey>,

    /// Keys that reached a terminal outcome; permanent
    visited: HashSet<UrlKey>,

    /// Total entries ever accepted
    enqueued_count: usize,

    /// Maximum number of entries ever accepted
    capacity: usize,

    /// Next discovery sequence number
    next_seq: u64,

    scope: HostScope,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `scope` - Host filter applied to every candidate
    /// * `capacity` - Maximum number of entries accepted over the frontier's lifetime
    pub fn new(scope: HostScope, capacity: usize) -> Self {
        Self {
            queue: BinaryHeap::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            visited: HashSet::new(),
            enqueued_count: 0,
            capacity,
            next_seq: 0,
            scope,
        }
    }

    /// Normalizes an absolute URL and offers it to the frontier
    ///
    /// # Returns
    ///
    /// * `Ok(UrlKey)` - The key was accepted
    /// * `Err(Rejection)` - Duplicate, over capacity, or out of scope
    pub fn enqueue(&mut self, raw: &str, priority: u8) -> Result<UrlKey, Rejection> {
        let key = normalize(raw, None).map_err(invalid)?;
        self.enqueue_key(key, priority)
    }

    /// Resolves a link against the page it was found on and offers it
    pub fn enqueue_relative(
        &mut self,
        raw: &str,
        base: &Url,
        priority: u8,
    ) -> Result<UrlKey, Rejection> {
        let key = normalize(raw, Some(base)).map_err(invalid)?;
        self.enqueue_key(key, priority)
    }

    /// Offers an already-normalized key
    pub fn enqueue_key(&mut self, key: UrlKey, priority: u8) -> Result<UrlKey, Rejection> {
        if !self.scope.admits(&key) {
            return Err(Rejection::OutOfScope(ScopeViolation::ForeignHost));
        }

        if key.is_binary_resource() {
            return Err(Rejection::OutOfScope(ScopeViolation::BinaryResource));
        }

        if self.contains(&key) {
            return Err(Rejection::DuplicateKey);
        }

        if self.is_at_capacity() {
            return Err(Rejection::CapacityReached);
        }

        let entry = UrlEntry {
            key: key.clone(),
            priority: priority.min(MAX_PRIORITY),
            discovered_seq: self.next_seq,
            discovered_at: Instant::now(),
        };
        self.next_seq += 1;
        self.enqueued_count += 1;
        self.queued.insert(key.clone());
        self.queue.push(entry);

        tracing::trace!(url = %key, priority, "Accepted into frontier");
        Ok(key)
    }

    /// Removes and returns the highest-priority entry
    ///
    /// The key moves to the in-flight set; the caller must report it back
    /// through [`mark_visited`](Self::mark_visited) once it reaches a
    /// terminal outcome.
    pub fn dequeue_next(&mut self) -> Option<UrlEntry> {
        let entry = self.queue.pop()?;
        self.queued.remove(&entry.key);
        self.in_flight.insert(entry.key.clone());
        Some(entry)
    }

    /// Records a key as permanently done (success or permanent failure)
    pub fn mark_visited(&mut self, key: &UrlKey) {
        self.in_flight.remove(key);
        self.visited.insert(key.clone());
    }

    /// Returns true if the key is queued, in flight or visited
    pub fn contains(&self, key: &UrlKey) -> bool {
        self.queued.contains(key) || self.in_flight.contains(key) || self.visited.contains(key)
    }

    /// Returns true if the key reached a terminal outcome
    pub fn is_visited(&self, key: &UrlKey) -> bool {
        self.visited.contains(key)
    }

    /// Number of entries waiting to be dequeued
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether no entries are waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of entries dequeued but not yet marked visited
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of keys marked visited
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Total entries accepted over the frontier's lifetime
    pub fn accepted(&self) -> usize {
        self.enqueued_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true once no further entries can be accepted
    pub fn is_at_capacity(&self) -> bool {
        self.enqueued_count >= self.capacity
    }

    pub fn scope(&self) -> &HostScope {
        &self.scope
    }
}

fn invalid(error: UrlError) -> Rejection {
    Rejection::OutOfScope(ScopeViolation::Invalid(error))
}
