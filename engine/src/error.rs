use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("stale sequence: received {received}, last seen {last_seen}")]
    StaleSequence { received: i64, last_seen: i64 },

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("average undefined: window holds no volume")]
    UndefinedAverage,

    #[error("invalid trade: price {price}, volume {volume}")]
    InvalidTrade { price: f64, volume: f64 },

    #[error("window capacity must be at least 1")]
    InvalidCapacity,

    #[error("instrument already registered: {0}")]
    DuplicateInstrument(String),

    #[error("result sink write failed: {0}")]
    SinkWrite(#[from] SinkError),

    #[error("dispatch actor task failed: {0}")]
    ActorFailed(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink closed")]
    Closed,
}
