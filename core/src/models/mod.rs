//! Shared data model for the VWAP pipeline.
//!
//! These types cross crate boundaries: the feed adapter produces
//! [`MarketEvent`]s, the engine consumes them and produces
//! [`AverageResult`]s, and the sinks render those.

pub mod average;
pub mod market_event;

pub use self::average::{AverageResult, VolumePoint};
pub use self::market_event::{Heartbeat, MarketEvent, TradeEvent};
