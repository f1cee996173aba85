use async_trait::async_trait;
use corelib::models::AverageResult;

use crate::error::SinkError;

/// Destination for computed averages.
///
/// Only ever called from the dispatch actor task, one result at a time, so
/// implementations need no internal synchronization. A failed write is
/// reported and the result is dropped; the engine never retries.
#[async_trait]
pub trait ResultSink: Send + 'static {
    async fn write(&mut self, result: &AverageResult) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    async fn write(&mut self, result: &AverageResult) -> Result<(), SinkError> {
        (**self).write(result).await
    }
}
