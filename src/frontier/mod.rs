//! The crawl frontier
//!
//! A bounded, priority-ordered, deduplicated work queue of pending URLs.
//! Entries are ordered by descending priority and, within a priority,
//! by discovery order, so a crawl is reproducible for a given input.

mod entry;
mod queue;

pub use entry::{UrlEntry, MAX_PRIORITY};
pub use queue::{Frontier, Rejection, ScopeViolation};
