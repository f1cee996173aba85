//! Per-instrument sequence watermark.
//!
//! Trades and heartbeats share one counter domain:
//! - a heartbeat sets the watermark to its sequence unconditionally
//! - a trade is stale when its sequence is strictly below the watermark
//! - an accepted trade moves the watermark to its own sequence
//!
//! An equal sequence is accepted. No reordering is attempted: a stale event is
//! rejected and left for the caller to report.

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceGuard {
    /// `None` until the first heartbeat or accepted trade.
    last_seen: Option<i64>,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.last_seen
    }

    /// Fails with `StaleSequence` if `sequence` is behind the watermark.
    /// Never mutates.
    pub fn check(&self, sequence: i64) -> Result<(), EngineError> {
        match self.last_seen {
            Some(last_seen) if sequence < last_seen => Err(EngineError::StaleSequence {
                received: sequence,
                last_seen,
            }),
            _ => Ok(()),
        }
    }

    /// Record an accepted trade. Callers must have passed [`check`](Self::check).
    pub fn advance(&mut self, sequence: i64) {
        self.last_seen = Some(sequence);
    }

    /// Apply a heartbeat and return the previous watermark.
    pub fn observe_heartbeat(&mut self, sequence: i64) -> Option<i64> {
        self.last_seen.replace(sequence)
    }
}
