//! Metrics hooks for adaptive filter experiments
//!
//! Counters for lookups, classified hits and swap activity. The experiment
//! runner records into any [`MetricsRecorder`]; [`NoOpMetrics`] disables it.
//!
//! ## Usage
//!
//! ```
//! use abf_core::metrics::{Metrics, MetricsRecorder};
//!
//! let metrics = Metrics::new();
//! metrics.record_lookup(true);
//! metrics.record_false_positive();
//! assert_eq!(metrics.snapshot().false_positives, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::SwapOutcome;

/// Thread-safe counters for filter activity
#[derive(Default)]
pub struct Metrics {
    /// Keys inserted into the live filter
    pub elements_inserted: AtomicU64,
    /// Keys recorded into the backing store
    pub shadow_inserts: AtomicU64,
    /// Membership tests performed
    pub lookups_performed: AtomicU64,
    /// Membership tests answering true
    pub lookups_positive: AtomicU64,
    /// Positives the oracle classified as false
    pub false_positives: AtomicU64,
    /// Swaps that found a relieving group
    pub swaps_relieved: AtomicU64,
    /// Swaps that cycled back to the original group
    pub swaps_exhausted: AtomicU64,
    /// Backing-store patterns installed by swaps
    pub backing_fetches: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&self) {
        self.elements_inserted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shadow_insert(&self) {
        self.shadow_inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lookup operation
    ///
    /// # Arguments
    /// * `found` - Whether the filter answered true (possibly false positive)
    pub fn record_lookup(&self, found: bool) {
        self.lookups_performed.fetch_add(1, Ordering::Relaxed);
        if found {
            self.lookups_positive.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_false_positive(&self) {
        self.false_positives.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_swap(&self, outcome: &SwapOutcome) {
        match outcome {
            SwapOutcome::Relieved { .. } => {
                self.swaps_relieved.fetch_add(1, Ordering::Relaxed);
            }
            SwapOutcome::Exhausted { .. } => {
                self.swaps_exhausted.fetch_add(1, Ordering::Relaxed);
            }
            SwapOutcome::Unavailable { .. } => {}
        }
        self.backing_fetches
            .fetch_add(outcome.fetches() as u64, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elements_inserted: self.elements_inserted.load(Ordering::Relaxed),
            shadow_inserts: self.shadow_inserts.load(Ordering::Relaxed),
            lookups_performed: self.lookups_performed.load(Ordering::Relaxed),
            lookups_positive: self.lookups_positive.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            swaps_relieved: self.swaps_relieved.load(Ordering::Relaxed),
            swaps_exhausted: self.swaps_exhausted.load(Ordering::Relaxed),
            backing_fetches: self.backing_fetches.load(Ordering::Relaxed),
        }
    }

    /// Ratio of positive lookups to total lookups.
    ///
    /// Includes both true and false positives.
    pub fn observed_positive_rate(&self) -> f64 {
        let total = self.lookups_performed.load(Ordering::Relaxed);
        let positive = self.lookups_positive.load(Ordering::Relaxed);
        if total > 0 {
            positive as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.elements_inserted,
            &self.shadow_inserts,
            &self.lookups_performed,
            &self.lookups_positive,
            &self.false_positives,
            &self.swaps_relieved,
            &self.swaps_exhausted,
            &self.backing_fetches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub elements_inserted: u64,
    pub shadow_inserts: u64,
    pub lookups_performed: u64,
    pub lookups_positive: u64,
    pub false_positives: u64,
    pub swaps_relieved: u64,
    pub swaps_exhausted: u64,
    pub backing_fetches: u64,
}

impl MetricsSnapshot {
    /// Mean backing-store fetches per swap
    pub fn fetches_per_swap(&self) -> f64 {
        let swaps = self.swaps_relieved + self.swaps_exhausted;
        if swaps == 0 {
            0.0
        } else {
            self.backing_fetches as f64 / swaps as f64
        }
    }
}

/// Trait for custom metrics recording implementations
pub trait MetricsRecorder: Send + Sync {
    fn record_insert(&self);

    fn record_shadow_insert(&self);

    fn record_lookup(&self, found: bool);

    fn record_false_positive(&self);

    fn record_swap(&self, outcome: &SwapOutcome);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_insert(&self) {}
    fn record_shadow_insert(&self) {}
    fn record_lookup(&self, _: bool) {}
    fn record_false_positive(&self) {}
    fn record_swap(&self, _: &SwapOutcome) {}
}

impl MetricsRecorder for Metrics {
    fn record_insert(&self) {
        Metrics::record_insert(self);
    }

    fn record_shadow_insert(&self) {
        Metrics::record_shadow_insert(self);
    }

    fn record_lookup(&self, found: bool) {
        Metrics::record_lookup(self, found);
    }

    fn record_false_positive(&self) {
        Metrics::record_false_positive(self);
    }

    fn record_swap(&self, outcome: &SwapOutcome) {
        Metrics::record_swap(self, outcome);
    }
}
