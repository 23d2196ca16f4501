//! Crawl statistics
//!
//! Counters kept by the coordinator during a run and handed to the sink
//! when the run finishes.

use crate::frontier::{Rejection, ScopeViolation};
use crate::output::traits::FinalOutcome;
use chrono::{DateTime, Utc};
use std::ops::AddAssign;

/// Frontier rejections by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    pub duplicate: u64,
    pub capacity: u64,
    pub foreign_host: u64,
    pub binary_resource: u64,
    pub invalid: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::DuplicateKey => self.duplicate += 1,
            Rejection::CapacityReached => self.capacity += 1,
            Rejection::OutOfScope(ScopeViolation::ForeignHost) => self.foreign_host += 1,
            Rejection::OutOfScope(ScopeViolation::BinaryResource) => self.binary_resource += 1,
            Rejection::OutOfScope(ScopeViolation::Invalid(_)) => self.invalid += 1,
        }
    }

    pub fn out_of_scope(&self) -> u64 {
        self.foreign_host + self.binary_resource + self.invalid
    }

    pub fn total(&self) -> u64 {
        self.duplicate + self.capacity + self.out_of_scope()
    }
}

impl AddAssign for RejectionCounts {
    fn add_assign(&mut self, other: Self) {
        self.duplicate += other.duplicate;
        self.capacity += other.capacity;
        self.foreign_host += other.foreign_host;
        self.binary_resource += other.binary_resource;
        self.invalid += other.invalid;
    }
}

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub pages_succeeded: u64,
    pub pages_failed: u64,
    pub pages_aborted: u64,

    /// Fetch attempts across all items
    pub total_attempts: u64,

    /// Candidate links returned by the extractor
    pub links_discovered: u64,

    /// Keys accepted by the frontier, seeds included
    pub urls_accepted: u64,

    pub rejections: RejectionCounts,

    /// Times the resource budget paused dequeues
    pub budget_pauses: u64,

    /// Whether the run was stopped by cancellation
    pub cancelled: bool,
}

impl CrawlStatistics {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            pages_succeeded: 0,
            pages_failed: 0,
            pages_aborted: 0,
            total_attempts: 0,
            links_discovered: 0,
            urls_accepted: 0,
            rejections: RejectionCounts::default(),
            budget_pauses: 0,
            cancelled: false,
        }
    }

    /// Counts one terminal item
    pub fn record_outcome(&mut self, outcome: &FinalOutcome, attempts: u32) {
        match outcome {
            FinalOutcome::Succeeded { .. } => self.pages_succeeded += 1,
            FinalOutcome::Failed { .. } => self.pages_failed += 1,
            FinalOutcome::Aborted => self.pages_aborted += 1,
        }
        self.total_attempts += u64::from(attempts);
    }

    /// Items that reached success or permanent failure
    pub fn pages_completed(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }

    /// Percentage of completed items that succeeded
    pub fn success_rate(&self) -> f64 {
        let completed = self.pages_completed();
        if completed == 0 {
            return 0.0;
        }
        (self.pages_succeeded as f64 / completed as f64) * 100.0
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    match stats.finished_at {
        Some(finished) => println!("  Finished: {}", finished.to_rfc3339()),
        None => println!("  Finished: (still running or interrupted)"),
    }
    if let Some(seconds) = stats.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    if stats.cancelled {
        println!("  Stopped by cancellation");
    }
    println!();

    println!("Pages:");
    println!("  Succeeded: {}", stats.pages_succeeded);
    println!("  Failed: {}", stats.pages_failed);
    println!("  Aborted: {}", stats.pages_aborted);
    println!("  Fetch attempts: {}", stats.total_attempts);
    println!();

    println!("Frontier:");
    println!("  Links discovered: {}", stats.links_discovered);
    println!("  URLs accepted: {}", stats.urls_accepted);
    println!("  Rejected as duplicate: {}", stats.rejections.duplicate);
    println!("  Rejected at capacity: {}", stats.rejections.capacity);
    println!(
        "  Rejected out of scope: {} (foreign host {}, binary {}, invalid {})",
        stats.rejections.out_of_scope(),
        stats.rejections.foreign_host,
        stats.rejections.binary_resource,
        stats.rejections.invalid
    );
    println!();

    if stats.budget_pauses > 0 {
        println!("Resource budget pauses: {}\n", stats.budget_pauses);
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully fetched)",
        stats.success_rate(),
        stats.pages_succeeded,
        stats.pages_completed()
    );
}
