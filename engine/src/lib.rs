//! Streaming VWAP engine.
//!
//! Leaf-first: [`window::Window`] holds the last N points,
//! [`aggregator::VwapAggregator`] keeps the running sums and the sequence
//! watermark for one instrument, and [`dispatcher::DispatchActor`] owns every
//! aggregator inside a single task fed by one channel.

pub mod aggregator;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod sequence;
pub mod sink;
pub mod window;

pub use aggregator::{AverageSnapshot, VwapAggregator};
pub use dispatcher::{ActorHandle, ActorReport, ActorState, DispatchActor, ExitReason};
pub use error::{EngineError, SinkError};
pub use sink::ResultSink;
