use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single executed trade for one instrument.
///
/// Immutable once built by the feed adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub instrument_id: String,
    pub sequence: i64,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeEvent {
    pub fn new(
        instrument_id: impl Into<String>,
        sequence: i64,
        price: f64,
        volume: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            sequence,
            price,
            volume,
            timestamp,
        }
    }
}

/// Liveness message that only advances an instrument's sequence watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub instrument_id: String,
    pub sequence: i64,
}

impl Heartbeat {
    pub fn new(instrument_id: impl Into<String>, sequence: i64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            sequence,
        }
    }
}

/// Everything the engine accepts on its inbound channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    Heartbeat(Heartbeat),
    Trade(TradeEvent),
}

impl MarketEvent {
    pub fn instrument_id(&self) -> &str {
        match self {
            MarketEvent::Heartbeat(h) => &h.instrument_id,
            MarketEvent::Trade(t) => &t.instrument_id,
        }
    }

    pub fn sequence(&self) -> i64 {
        match self {
            MarketEvent::Heartbeat(h) => h.sequence,
            MarketEvent::Trade(t) => t.sequence,
        }
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::Heartbeat(_) => "heartbeat",
            MarketEvent::Trade(_) => "trade",
        }
    }
}

impl From<Heartbeat> for MarketEvent {
    fn from(h: Heartbeat) -> Self {
        MarketEvent::Heartbeat(h)
    }
}

impl From<TradeEvent> for MarketEvent {
    fn from(t: TradeEvent) -> Self {
        MarketEvent::Trade(t)
    }
}
