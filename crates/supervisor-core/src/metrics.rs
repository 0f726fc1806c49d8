//! Process-wide execution counters.
//!
//! Incremented silently at the call site; [`Metrics::flush`] emits the
//! current values as one `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free atomic counters.
pub struct Metrics {
    rules_executed: AtomicU64,
    rules_failed: AtomicU64,
    phases_executed: AtomicU64,
    plugins_loaded: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rules_executed: AtomicU64::new(0),
            rules_failed: AtomicU64::new(0),
            phases_executed: AtomicU64::new(0),
            plugins_loaded: AtomicU64::new(0),
        }
    }

    /// Count one rule execution, and one failure when it did not pass.
    pub fn record_rule(&self, passed: bool) {
        self.rules_executed.fetch_add(1, Ordering::Relaxed);
        if !passed {
            self.rules_failed.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "rules_executed", "counter incremented");
    }

    /// Increment the phases-executed counter by one.
    pub fn inc_phases(&self) {
        self.phases_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "phases_executed", "counter incremented");
    }

    /// Increment the plugins-loaded counter by one.
    pub fn inc_plugins_loaded(&self) {
        self.plugins_loaded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "plugins_loaded", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Called from [`crate::RuleEngine::cleanup`], not on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            rules_executed = self.rules_executed(),
            rules_failed = self.rules_failed(),
            phases_executed = self.phases_executed(),
            plugins_loaded = self.plugins_loaded(),
        );
    }

    /// Read the current rules-executed count.
    pub fn rules_executed(&self) -> u64 {
        self.rules_executed.load(Ordering::Relaxed)
    }

    /// Read the current rules-failed count.
    pub fn rules_failed(&self) -> u64 {
        self.rules_failed.load(Ordering::Relaxed)
    }

    /// Read the current phases-executed count.
    pub fn phases_executed(&self) -> u64 {
        self.phases_executed.load(Ordering::Relaxed)
    }

    /// Read the current plugins-loaded count.
    pub fn plugins_loaded(&self) -> u64 {
        self.plugins_loaded.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.rules_executed.store(0, Ordering::Relaxed);
        self.rules_failed.store(0, Ordering::Relaxed);
        self.phases_executed.store(0, Ordering::Relaxed);
        self.plugins_loaded.store(0, Ordering::Relaxed);
    }
}
