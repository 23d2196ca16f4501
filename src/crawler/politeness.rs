//! Politeness governor
//!
//! Two duties:
//! - a randomized delay before every fetch, applied per worker
//! - a process-wide resource budget check that pauses dequeues while usage
//!   stays above the configured fraction of the budget

use crate::config::{PolitenessConfig, ResourceConfig};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Source of resource usage measurements
pub trait ResourceSampler: Send + Sync {
    /// Current usage in bytes
    fn sample(&self) -> u64;

    /// Asks the runtime to give memory back; no-op unless the sampler knows how
    fn reclaim(&self) {}
}

/// Resident set size of the current process
///
/// Reads the `VmRSS` line of `/proc/self/status`, which the kernel reports
/// in kB whatever the page size. Reports 0 where that file does not exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemorySampler;

impl ResourceSampler for ProcessMemorySampler {
    fn sample(&self) -> u64 {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_resident_bytes(&status))
            .unwrap_or(0)
    }
}

fn parse_resident_bytes(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value.saturating_mul(1024)),
        Some(_) => None,
    }
}

/// One reading taken by the governor
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub used_bytes: u64,
    pub budget_bytes: u64,
    pub timestamp: Instant,
}

impl ResourceSample {
    /// Fraction of the budget in use
    pub fn usage_ratio(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.budget_bytes as f64
    }
}

#[derive(Debug, Clone, Copy)]
pub enum BudgetStatus {
    Ok(ResourceSample),
    Exceeded(ResourceSample),
}

impl BudgetStatus {
    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded(_))
    }
}

/// Inter-request delay and resource budget enforcement for one crawl run
pub struct PolitenessGovernor {
    min_delay: Duration,
    jitter: Duration,

    sampler: Arc<dyn ResourceSampler>,
    budget_bytes: u64,
    threshold: f64,
    check_every: u64,
    grace_period: Duration,
    max_pause_cycles: u32,

    /// Dequeues since the last budget check; also the process-wide gate
    gate: Mutex<u64>,
    pauses: AtomicU64,
}

impl PolitenessGovernor {
    pub fn new(
        politeness: &PolitenessConfig,
        resources: &ResourceConfig,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        Self {
            min_delay: Duration::from_millis(politeness.min_delay_ms),
            jitter: Duration::from_millis(politeness.jitter_ms),
            sampler,
            budget_bytes: resources.budget_bytes,
            threshold: resources.threshold,
            check_every: resources.check_every.max(1),
            grace_period: Duration::from_millis(resources.grace_period_ms),
            max_pause_cycles: resources.max_pause_cycles,
            gate: Mutex::new(0),
            pauses: AtomicU64::new(0),
        }
    }

    /// Draws a delay from `[min_delay, min_delay + jitter)`
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.min_delay;
        }
        self.min_delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }

    /// Waits out the politeness delay
    ///
    /// Returns `false` if the crawl was cancelled while waiting.
    pub async fn delay_before_next_fetch(&self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }

        tracing::trace!(delay_ms = delay.as_millis() as u64, "Politeness delay");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Takes one sample and compares it against the budget threshold
    pub fn check_resource_budget(&self) -> BudgetStatus {
        let sample = ResourceSample {
            used_bytes: self.sampler.sample(),
            budget_bytes: self.budget_bytes,
            timestamp: Instant::now(),
        };

        if sample.usage_ratio() > self.threshold {
            BudgetStatus::Exceeded(sample)
        } else {
            BudgetStatus::Ok(sample)
        }
    }

    /// Consulted before every dequeue
    ///
    /// Every `check_every` calls the budget is sampled. While it is exceeded
    /// the governor reclaims, waits the grace period and re-checks, up to
    /// `max_pause_cycles` times; after that it lets the crawl continue in a
    /// degraded state. The gate is held for the whole pause so every worker
    /// waits on the same decision.
    ///
    /// Returns `false` if the crawl was cancelled during a pause.
    pub async fn enforce_budget(&self, cancel: &CancellationToken) -> bool {
        let mut since_check = self.gate.lock().await;
        *since_check += 1;
        if *since_check < self.check_every {
            return true;
        }
        *since_check = 0;

        let mut sample = match self.check_resource_budget() {
            BudgetStatus::Ok(_) => return true,
            BudgetStatus::Exceeded(sample) => sample,
        };

        self.pauses.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            used_bytes = sample.used_bytes,
            budget_bytes = sample.budget_bytes,
            threshold = self.threshold,
            "Resource budget exceeded, pausing dequeues"
        );

        for cycle in 1..=self.max_pause_cycles {
            self.sampler.reclaim();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.grace_period) => {}
            }

            match self.check_resource_budget() {
                BudgetStatus::Ok(ok) => {
                    tracing::info!(
                        cycle,
                        used_bytes = ok.used_bytes,
                        "Resource usage back under budget, resuming"
                    );
                    return true;
                }
                BudgetStatus::Exceeded(still) => sample = still,
            }
        }

        tracing::warn!(
            cycles = self.max_pause_cycles,
            used_bytes = sample.used_bytes,
            budget_bytes = sample.budget_bytes,
            "Still over resource budget, resuming in degraded mode"
        );
        true
    }

    /// Number of times the budget check paused the crawl
    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }
}
