//! Metrics hooks for the dedup engine.
//!
//! Callers install a global [`EngineMetrics`] implementation via
//! [`set_engine_metrics`]; `DedupEngine` implementations then report ingest
//! outcomes without depending on any specific metrics backend.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Outcome of a single `ingest` call, for metrics purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The content matched an existing canonical thread.
    MatchedExisting,
    /// A new canonical thread was created.
    CreatedNew,
}

/// Metrics observer for ingest operations.
pub trait EngineMetrics: Send + Sync {
    /// Record the outcome of one `ingest` call, including how long it took
    /// and how many orphan children were adopted by it (0 for existing-match
    /// outcomes, since orphan adoption only happens for newly created
    /// threads).
    fn record_ingest(&self, outcome: IngestOutcome, latency: Duration, adopted_children: usize);
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn EngineMetrics>>> {
    static METRICS: OnceCell<RwLock<Option<Arc<dyn EngineMetrics>>>> = OnceCell::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

pub(crate) fn metrics_recorder() -> Option<Arc<dyn EngineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

/// Install or clear the global engine metrics recorder. Typically called
/// once during service startup.
pub fn set_engine_metrics(recorder: Option<Arc<dyn EngineMetrics>>) {
    let lock = metrics_lock();
    let mut guard = lock.write().expect("engine metrics lock poisoned");
    *guard = recorder;
}
