use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (price, volume) observation held inside a VWAP window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub price: f64,
    pub volume: f64,
}

impl VolumePoint {
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }

    /// price × volume, the point's contribution to the weighted sum.
    pub fn value(&self) -> f64 {
        self.price * self.volume
    }
}

/// VWAP emitted for one accepted trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageResult {
    pub instrument_id: String,
    /// Timestamp of the trade that produced this average.
    pub timestamp: DateTime<Utc>,
    pub average: f64,
    /// Number of window entries the average was computed over.
    pub total_points: usize,
}
