use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
///
/// Cloning shares the underlying atomics, so a caller can keep a handle while
/// the dispatch actor increments from its own task.
#[derive(Clone, Default)]
pub struct Counters {
    pub heartbeats: Arc<AtomicU64>,
    pub trades_accepted: Arc<AtomicU64>,
    pub results_written: Arc<AtomicU64>,

    // drop reasons
    pub stale_rejected: Arc<AtomicU64>,
    pub unknown_instrument: Arc<AtomicU64>,
    pub unknown_heartbeat: Arc<AtomicU64>,
    pub invalid_trade: Arc<AtomicU64>,
    pub undefined_average: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);

        CountersSnapshot {
            heartbeats: load(&self.heartbeats),
            trades_accepted: load(&self.trades_accepted),
            results_written: load(&self.results_written),
            stale_rejected: load(&self.stale_rejected),
            unknown_instrument: load(&self.unknown_instrument),
            unknown_heartbeat: load(&self.unknown_heartbeat),
            invalid_trade: load(&self.invalid_trade),
            undefined_average: load(&self.undefined_average),
            sink_failures: load(&self.sink_failures),
        }
    }
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub heartbeats: u64,
    pub trades_accepted: u64,
    pub results_written: u64,
    pub stale_rejected: u64,
    pub unknown_instrument: u64,
    pub unknown_heartbeat: u64,
    pub invalid_trade: u64,
    pub undefined_average: u64,
    pub sink_failures: u64,
}
