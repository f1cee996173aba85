use std::time::Duration;

use corelib::models::MarketEvent;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, trace, warn};

use crate::coinbase::error::FeedError;
use crate::coinbase::parser::{FeedMessage, decode_feed_message};
use crate::coinbase::types::{SubscriptionAction, SubscriptionRequest};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWrite = SplitSink<WsStream, Message>;
pub type WsRead = SplitStream<WsStream>;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why [`FeedClient::receive`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    Cancelled,
    /// The server closed the socket or the stream ran dry.
    StreamEnded,
    /// The engine dropped its receiver.
    EngineClosed,
}

/// Client for the exchange's public WebSocket feed.
///
/// This client:
/// - subscribes to the `heartbeat` and `ticker` channels for its products
/// - decodes every frame and forwards market events into the engine channel
/// - unsubscribes on request
///
/// It is generic over the two socket halves so tests can drive it with
/// in-memory streams. [`FeedClient::connect`] builds the real thing.
pub struct FeedClient<W, R> {
    write: W,
    read: R,
    product_ids: Vec<String>,
    handshake_timeout: Duration,
    span: Span,
}

impl FeedClient<WsWrite, WsRead> {
    /// Dial `endpoint`, giving up after `connect_timeout`.
    pub async fn connect(
        endpoint: &str,
        product_ids: Vec<String>,
        connect_timeout: Duration,
    ) -> Result<Self, FeedError> {
        debug!(endpoint, "connecting to feed");

        let (ws, response) = timeout(connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| FeedError::Timeout("connect", connect_timeout))??;

        info!(endpoint, status = %response.status(), "connected to feed");

        let (write, read) = ws.split();
        Ok(Self::new(write, read, product_ids))
    }
}

impl<W, R> FeedClient<W, R>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    pub fn new(write: W, read: R, product_ids: Vec<String>) -> Self {
        Self {
            write,
            read,
            product_ids,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            span: info_span!("feed"),
        }
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn subscribe(&mut self) -> Result<(), FeedError> {
        let span = self.span.clone();
        let wait = self.handshake_timeout;
        self.handshake(SubscriptionAction::Subscribe, wait)
            .instrument(span)
            .await
    }

    pub async fn unsubscribe(&mut self) -> Result<(), FeedError> {
        let wait = self.handshake_timeout;
        self.unsubscribe_within(wait).await
    }

    /// Unsubscribe with its own reply deadline, for callers on a shutdown
    /// path that cannot afford the full handshake timeout.
    pub async fn unsubscribe_within(&mut self, wait: Duration) -> Result<(), FeedError> {
        let span = self.span.clone();
        self.handshake(SubscriptionAction::Unsubscribe, wait)
            .instrument(span)
            .await
    }

    /// Send the request, then wait for the next text frame.
    ///
    /// Only an `error` reply fails the handshake; anything else counts as an
    /// answer.
    async fn handshake(
        &mut self,
        action: SubscriptionAction,
        wait: Duration,
    ) -> Result<(), FeedError> {
        let request = SubscriptionRequest::new(action, &self.product_ids);
        let text = serde_json::to_string(&request)?;

        self.write.send(Message::text(text)).await?;
        debug!(action = action.as_str(), products = ?self.product_ids, "request sent");

        let reply = timeout(wait, self.next_text())
            .await
            .map_err(|_| FeedError::Timeout(action.as_str(), wait))??;

        match decode_feed_message(&reply)? {
            FeedMessage::Error { message, reason } => {
                error!(action = action.as_str(), %message, %reason, "request rejected");
                Err(FeedError::Rejected {
                    action: action.as_str(),
                    message,
                    reason,
                })
            }
            FeedMessage::Subscriptions(channels) => {
                info!(action = action.as_str(), ?channels, "request acknowledged");
                Ok(())
            }
            other => {
                debug!(action = action.as_str(), reply = ?other, "request answered by a non-ack frame");
                Ok(())
            }
        }
    }

    async fn next_text(&mut self) -> Result<String, FeedError> {
        while let Some(frame) = self.read.next().await {
            match frame? {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Close(_) => return Err(FeedError::Closed("server sent close")),
                _ => continue,
            }
        }

        Err(FeedError::Closed("stream ended"))
    }

    /// Forward market events into `sender` until cancelled or a side closes.
    ///
    /// Frames that fail to decode and `error` frames are logged and skipped.
    /// A transport error ends the loop with `Err`.
    pub async fn receive(
        &mut self,
        sender: Sender<MarketEvent>,
        cancel: CancellationToken,
    ) -> Result<ReceiveExit, FeedError> {
        let span = self.span.clone();
        self.receive_loop(sender, cancel).instrument(span).await
    }

    async fn receive_loop(
        &mut self,
        sender: Sender<MarketEvent>,
        cancel: CancellationToken,
    ) -> Result<ReceiveExit, FeedError> {
        info!(products = ?self.product_ids, "receiving feed");

        loop {
            let frame = tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(ReceiveExit::Cancelled),
                frame = self.read.next() => frame,
            };

            let Some(frame) = frame else {
                info!("feed stream ended");
                return Ok(ReceiveExit::StreamEnded);
            };

            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(reason) => {
                    info!(?reason, "feed closed by server");
                    return Ok(ReceiveExit::StreamEnded);
                }
                _ => continue,
            };

            match decode_feed_message(text.as_str()) {
                Ok(FeedMessage::Market(event)) => {
                    trace!(
                        kind = event.kind(),
                        instrument = event.instrument_id(),
                        sequence = event.sequence(),
                        "forwarding market event"
                    );

                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => return Ok(ReceiveExit::Cancelled),
                        sent = sender.send(event) => {
                            if sent.is_err() {
                                warn!("engine channel closed, stopping feed");
                                return Ok(ReceiveExit::EngineClosed);
                            }
                        }
                    }
                }
                Ok(FeedMessage::Error { message, reason }) => {
                    error!(%message, %reason, "feed reported an error")
                }
                Ok(FeedMessage::Subscriptions(channels)) => {
                    debug!(?channels, "subscription update")
                }
                Ok(FeedMessage::Unknown(kind)) => debug!(kind, "unhandled feed message"),
                Err(e) => warn!(error = %e, "cannot decode feed frame"),
            }
        }
    }

    /// Close the write half. Best effort: the peer may already be gone.
    pub async fn close(&mut self) -> Result<(), FeedError> {
        self.write.close().await?;
        Ok(())
    }
}
