//! Global atomic counters for Crowdsift observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI invocation).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters — no allocations, no locking.
pub struct Metrics {
    submissions_accepted: AtomicU64,
    duplicates_rejected: AtomicU64,
    tasks_resolved: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            submissions_accepted: AtomicU64::new(0),
            duplicates_rejected: AtomicU64::new(0),
            tasks_resolved: AtomicU64::new(0),
        }
    }

    /// Increment the submissions-accepted counter by one.
    pub fn inc_submissions_accepted(&self) {
        self.submissions_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "submissions_accepted", "counter incremented");
    }

    /// Increment the duplicates-rejected counter by one.
    pub fn inc_duplicates_rejected(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "duplicates_rejected", "counter incremented");
    }

    /// Increment the tasks-resolved counter by one.
    pub fn inc_tasks_resolved(&self) {
        self.tasks_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tasks_resolved", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a request batch, CLI
    /// exit, daemon tick) rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            submissions_accepted = self.submissions_accepted(),
            duplicates_rejected = self.duplicates_rejected(),
            tasks_resolved = self.tasks_resolved(),
        );
    }

    /// Read the current submissions-accepted count.
    pub fn submissions_accepted(&self) -> u64 {
        self.submissions_accepted.load(Ordering::Relaxed)
    }

    /// Read the current duplicates-rejected count.
    pub fn duplicates_rejected(&self) -> u64 {
        self.duplicates_rejected.load(Ordering::Relaxed)
    }

    /// Read the current tasks-resolved count.
    pub fn tasks_resolved(&self) -> u64 {
        self.tasks_resolved.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.submissions_accepted.store(0, Ordering::Relaxed);
        self.duplicates_rejected.store(0, Ordering::Relaxed);
        self.tasks_resolved.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.submissions_accepted(), 0);
        m.inc_submissions_accepted();
        m.inc_submissions_accepted();
        assert_eq!(m.submissions_accepted(), 2);

        m.inc_duplicates_rejected();
        assert_eq!(m.duplicates_rejected(), 1);

        m.inc_tasks_resolved();
        assert_eq!(m.tasks_resolved(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_submissions_accepted();
        m.inc_duplicates_rejected();
        m.inc_tasks_resolved();
        m.reset();
        assert_eq!(m.submissions_accepted(), 0);
        assert_eq!(m.duplicates_rejected(), 0);
        assert_eq!(m.tasks_resolved(), 0);
    }
}
