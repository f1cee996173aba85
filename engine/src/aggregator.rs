//! Per-instrument VWAP aggregator.
//!
//! Keeps two running sums over the points currently in the window:
//!
//! ```text
//! total_volume = Σ volume_i
//! total_value  = Σ price_i * volume_i
//! vwap         = total_value / total_volume
//! ```
//!
//! Both sums are updated incrementally on insert and evict, so `add` and
//! `compute_average` are O(1) regardless of window capacity. The window is
//! never rescanned.
//!
//! ## Undefined average
//! With no volume in the window (empty, or only zero-volume trades) the
//! average is undefined. `compute_average` returns
//! `EngineError::UndefinedAverage` instead of NaN/Inf so callers can tell it
//! apart from a genuine value.
//!
//! ## Input validation
//! Non-finite prices/volumes, negative volumes, and points whose value or
//! resulting sums overflow `f64` are rejected before any state changes: a
//! poisoned sum would never heal because it is never recomputed.

use corelib::models::{TradeEvent, VolumePoint};

use crate::error::EngineError;
use crate::sequence::SequenceGuard;
use crate::window::Window;

/// Result of a successful average read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageSnapshot {
    pub average: f64,
    /// Number of points currently in the window.
    pub total_points: usize,
}

#[derive(Debug, Clone)]
pub struct VwapAggregator {
    window: Window,
    total_volume: f64,
    total_value: f64,

    /// Points in the window with a strictly positive volume.
    weighted_points: usize,

    guard: SequenceGuard,
}

impl VwapAggregator {
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        Ok(Self {
            window: Window::new(capacity)?,
            total_volume: 0.0,
            total_value: 0.0,
            weighted_points: 0,
            guard: SequenceGuard::new(),
        })
    }

    /// Insert one (price, volume) point, evicting the oldest when full.
    pub fn add(&mut self, price: f64, volume: f64) -> Result<(), EngineError> {
        if !price.is_finite() || !volume.is_finite() || volume < 0.0 {
            return Err(EngineError::InvalidTrade { price, volume });
        }

        let point = VolumePoint::new(price, volume);

        // Work out the new sums before touching anything.
        let evicted = self.window.is_full().then(|| self.window.oldest().copied()).flatten();
        let (mut total_volume, mut total_value) = (self.total_volume, self.total_value);
        if let Some(evicted) = evicted {
            total_volume -= evicted.volume;
            total_value -= evicted.value();
        }
        total_volume += point.volume;
        total_value += point.value();

        if !point.value().is_finite() || !total_volume.is_finite() || !total_value.is_finite() {
            return Err(EngineError::InvalidTrade { price, volume });
        }

        if let Some(evicted) = self.window.push(point) {
            if evicted.volume > 0.0 {
                self.weighted_points -= 1;
            }
        }

        self.total_volume = total_volume;
        self.total_value = total_value;
        if point.volume > 0.0 {
            self.weighted_points += 1;
        }

        // Snap rounding residue to exact zero once no weighted point remains.
        if self.weighted_points == 0 {
            self.total_volume = 0.0;
            self.total_value = 0.0;
        }

        Ok(())
    }

    /// Current VWAP and window length. Pure read.
    pub fn compute_average(&self) -> Result<AverageSnapshot, EngineError> {
        if self.weighted_points == 0 || self.total_volume <= 0.0 {
            return Err(EngineError::UndefinedAverage);
        }

        Ok(AverageSnapshot {
            average: self.total_value / self.total_volume,
            total_points: self.window.len(),
        })
    }

    /// Apply a heartbeat to the sequence watermark. Returns the previous one.
    pub fn process_heartbeat(&mut self, sequence: i64) -> Option<i64> {
        self.guard.observe_heartbeat(sequence)
    }

    /// Sequence check, then add, then read the new average.
    ///
    /// A stale or invalid trade leaves the aggregator untouched. A trade that
    /// is accepted but leaves the window without volume still advances the
    /// watermark and returns `UndefinedAverage`.
    pub fn process_trade(&mut self, trade: &TradeEvent) -> Result<AverageSnapshot, EngineError> {
        self.guard.check(trade.sequence)?;
        self.add(trade.price, trade.volume)?;
        self.guard.advance(trade.sequence);

        self.compute_average()
    }

    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    pub fn last_sequence(&self) -> Option<i64> {
        self.guard.last_seen()
    }
}
