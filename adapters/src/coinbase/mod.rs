pub mod error;
pub mod parser;
pub mod types;
pub mod ws;

pub use error::{DecodeError, FeedError};
pub use parser::{FeedMessage, decode_feed_message};
pub use ws::{FeedClient, ReceiveExit};

/// Channels requested for every product.
pub const CHANNELS: [&str; 2] = ["heartbeat", "ticker"];
