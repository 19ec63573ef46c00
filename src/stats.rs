//! Run statistics shared between the engine and whoever is watching it.
//!
//! One [`Stats`] lives for one run. The scanner bumps `excluded`, the engine
//! bumps everything else, and a foreground thread may read the counters at any
//! time. Counters are independent atomics: a reader can observe one counter
//! updated before another, which is fine for progress display.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for a single organization run.
#[derive(Debug, Default)]
pub struct Stats {
    processed: AtomicU64,
    skipped: AtomicU64,
    excluded: AtomicU64,
    errored: AtomicU64,
}

/// A point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Files moved (or, in a simulation, files that would be moved).
    pub processed: u64,
    /// Files already sitting in their category folder.
    pub skipped: u64,
    /// Entries rejected by the exclusion-name filter.
    pub excluded: u64,
    /// Files whose move failed.
    pub errored: u64,
}

impl Stats {
    /// Creates a set of counters, all at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a file moved, or that would be moved in a simulation.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a file already in its category folder.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an entry rejected by the exclusion-name filter.
    pub fn record_excluded(&self) {
        self.excluded.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a failed move.
    pub fn record_error(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Files moved (or would-be-moved) so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Files left in place so far.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Entries excluded by name so far.
    pub fn excluded(&self) -> u64 {
        self.excluded.load(Ordering::Relaxed)
    }

    /// Failed moves so far.
    pub fn errored(&self) -> u64 {
        self.errored.load(Ordering::Relaxed)
    }

    /// Reads every counter once.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed(),
            skipped: self.skipped(),
            excluded: self.excluded(),
            errored: self.errored(),
        }
    }
}

impl StatsSnapshot {
    /// Candidates the engine handled: processed, skipped or errored.
    pub fn handled(&self) -> u64 {
        self.processed + self.skipped + self.errored
    }
}
