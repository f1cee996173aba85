//! Boundary adapters around the VWAP engine: the exchange feed on the way in,
//! result sinks on the way out.

pub mod coinbase;
pub mod output;
