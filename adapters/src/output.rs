//! Result sinks: formatted lines for humans, channels for in-process consumers.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use corelib::models::AverageResult;
use engine::{ResultSink, SinkError};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, Receiver, Sender};

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// `[<rfc2822>], ProductID: <id>, Average: <avg>, Total data points: <n>`
pub fn format_line(result: &AverageResult) -> String {
    format!(
        "[{}], ProductID: {}, Average: {:.6}, Total data points: {}\n",
        result.timestamp.to_rfc2822(),
        result.instrument_id,
        result.average,
        result.total_points
    )
}

/// Writes one line per result and flushes after each.
pub struct LineSink<W> {
    writer: W,
}

impl<W> LineSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> ResultSink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write(&mut self, result: &AverageResult) -> Result<(), SinkError> {
        let line = format_line(result);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Line sink on `path` (created if missing, appended to) or on stdout.
pub async fn open_output(path: Option<&Path>) -> anyhow::Result<LineSink<BoxedWriter>> {
    let writer: BoxedWriter = match path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("cannot open output file {}", path.display()))?;
            Box::new(file)
        }
        None => Box::new(tokio::io::stdout()),
    };

    Ok(LineSink::new(writer))
}

/// Forwards every result into a bounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    sender: Sender<AverageResult>,
}

impl ChannelSink {
    pub fn new(sender: Sender<AverageResult>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, Receiver<AverageResult>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn write(&mut self, result: &AverageResult) -> Result<(), SinkError> {
        self.sender
            .send(result.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}
