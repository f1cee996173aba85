use std::time::Duration;

use adapters::coinbase::{FeedClient, FeedError, ReceiveExit};
use corelib::models::MarketEvent;
use futures::channel::mpsc::{self as fmpsc, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

type Inbound = UnboundedSender<Result<Message, tungstenite::Error>>;
type Wire = UnboundedReceiver<Message>;

/// Client wired to in-memory halves: `Inbound` feeds frames to the client,
/// `Wire` collects what the client sends.
fn client(
    products: &[&str],
) -> (
    FeedClient<
        impl futures::Sink<Message, Error = tungstenite::Error> + Unpin,
        UnboundedReceiver<Result<Message, tungstenite::Error>>,
    >,
    Inbound,
    Wire,
) {
    let (wire_tx, wire_rx) = fmpsc::unbounded::<Message>();
    let (in_tx, in_rx) = fmpsc::unbounded();

    let write = wire_tx.sink_map_err(|_| tungstenite::Error::ConnectionClosed);
    let products = products.iter().map(|p| p.to_string()).collect();

    let client = FeedClient::new(write, in_rx, products)
        .with_handshake_timeout(Duration::from_millis(200));

    (client, in_tx, wire_rx)
}

fn text(v: Value) -> Result<Message, tungstenite::Error> {
    Ok(Message::text(v.to_string()))
}

fn ticker(product: &str, seq: i64, price: &str, size: &str) -> Result<Message, tungstenite::Error> {
    text(json!({
        "type": "ticker",
        "sequence": seq,
        "product_id": product,
        "price": price,
        "last_size": size,
        "time": "2022-01-01T00:00:00.000000Z"
    }))
}

fn heartbeat(product: &str, seq: i64) -> Result<Message, tungstenite::Error> {
    text(json!({
        "type": "heartbeat",
        "sequence": seq,
        "last_trade_id": 1,
        "product_id": product,
        "time": "2022-01-01T00:00:00.000000Z"
    }))
}

fn ack(products: &[&str]) -> Result<Message, tungstenite::Error> {
    text(json!({
        "type": "subscriptions",
        "channels": [
            { "name": "heartbeat", "product_ids": products },
            { "name": "ticker", "product_ids": products }
        ]
    }))
}

async fn sent_json(wire: &mut Wire) -> Value {
    match wire.next().await {
        Some(Message::Text(t)) => serde_json::from_str(t.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn subscribe_sends_request_and_accepts_ack() {
    let (mut client, inbound, mut wire) = client(&["BTC-USD", "ETH-USD"]);
    inbound.unbounded_send(ack(&["BTC-USD", "ETH-USD"])).unwrap();

    client.subscribe().await.unwrap();

    let sent = sent_json(&mut wire).await;
    assert_eq!(sent["type"], "subscribe");
    assert_eq!(sent["product_ids"], json!(["BTC-USD", "ETH-USD"]));
    assert_eq!(sent["channels"], json!(["heartbeat", "ticker"]));
}

#[tokio::test]
async fn unsubscribe_uses_the_same_products() {
    let (mut client, inbound, mut wire) = client(&["BTC-USD"]);
    inbound.unbounded_send(ack(&[])).unwrap();

    client.unsubscribe().await.unwrap();

    let sent = sent_json(&mut wire).await;
    assert_eq!(sent["type"], "unsubscribe");
    assert_eq!(sent["product_ids"], json!(["BTC-USD"]));
}

#[tokio::test]
async fn error_reply_rejects_the_handshake() {
    let (mut client, inbound, _wire) = client(&["NOPE-USD"]);
    inbound
        .unbounded_send(text(json!({
            "type": "error",
            "message": "Failed to subscribe",
            "reason": "NOPE-USD is not a valid product"
        })))
        .unwrap();

    match client.subscribe().await.unwrap_err() {
        FeedError::Rejected {
            action,
            message,
            reason,
        } => {
            assert_eq!(action, "subscribe");
            assert_eq!(message, "Failed to subscribe");
            assert!(reason.contains("NOPE-USD"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn silent_server_times_out_the_handshake() {
    let (mut client, _inbound, _wire) = client(&["BTC-USD"]);

    let err = client.subscribe().await.unwrap_err();
    assert!(matches!(err, FeedError::Timeout("subscribe", _)));
}

#[tokio::test]
async fn unsubscribe_within_uses_its_own_deadline() {
    let (client, _inbound, mut wire) = client(&["BTC-USD"]);
    let mut client = client.with_handshake_timeout(Duration::from_secs(30));

    let err = tokio::time::timeout(
        Duration::from_secs(2),
        client.unsubscribe_within(Duration::from_millis(50)),
    )
    .await
    .expect("bounded by the short deadline, not the handshake timeout")
    .unwrap_err();

    assert!(matches!(err, FeedError::Timeout("unsubscribe", d) if d == Duration::from_millis(50)));

    let sent = wire.next().await.unwrap();
    let sent: Value = serde_json::from_str(sent.to_text().unwrap()).unwrap();
    assert_eq!(sent["type"], "unsubscribe");
}

#[tokio::test]
async fn closed_stream_during_handshake_is_an_error() {
    let (mut client, inbound, _wire) = client(&["BTC-USD"]);
    drop(inbound);

    let err = client.subscribe().await.unwrap_err();
    assert!(matches!(err, FeedError::Closed(_)));
}

#[tokio::test]
async fn receive_forwards_market_events_and_skips_the_rest() {
    let (mut client, inbound, _wire) = client(&["BTC-USD"]);
    let (tx, mut rx) = mpsc::channel(16);

    inbound.unbounded_send(heartbeat("BTC-USD", 10)).unwrap();
    inbound.unbounded_send(Ok(Message::text("not json"))).unwrap();
    inbound
        .unbounded_send(text(json!({ "type": "l2update", "changes": [] })))
        .unwrap();
    inbound
        .unbounded_send(text(json!({ "type": "error", "message": "slow down" })))
        .unwrap();
    inbound.unbounded_send(Ok(Message::Ping(Vec::new().into()))).unwrap();
    inbound.unbounded_send(ticker("BTC-USD", 11, "100.5", "0.25")).unwrap();
    drop(inbound);

    let exit = client.receive(tx, CancellationToken::new()).await.unwrap();
    assert_eq!(exit, ReceiveExit::StreamEnded);

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, MarketEvent::Heartbeat(ref h) if h.sequence == 10));

    match rx.recv().await.unwrap() {
        MarketEvent::Trade(t) => {
            assert_eq!(t.instrument_id, "BTC-USD");
            assert_eq!(t.sequence, 11);
            assert_eq!(t.price, 100.5);
            assert_eq!(t.volume, 0.25);
        }
        other => panic!("expected a trade, got {other:?}"),
    }

    // the sender was consumed by receive, so the channel is now closed
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn close_frame_ends_the_stream() {
    let (mut client, inbound, _wire) = client(&["BTC-USD"]);
    let (tx, _rx) = mpsc::channel(4);

    inbound.unbounded_send(Ok(Message::Close(None))).unwrap();

    let exit = client.receive(tx, CancellationToken::new()).await.unwrap();
    assert_eq!(exit, ReceiveExit::StreamEnded);
}

#[tokio::test]
async fn cancellation_stops_an_idle_receive() {
    let (mut client, _inbound, _wire) = client(&["BTC-USD"]);
    let (tx, _rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        stopper.cancel();
    });

    let exit = client.receive(tx, cancel).await.unwrap();
    assert_eq!(exit, ReceiveExit::Cancelled);
}

#[tokio::test]
async fn dropped_engine_channel_stops_receive() {
    let (mut client, inbound, _wire) = client(&["BTC-USD"]);
    let (tx, rx) = mpsc::channel(4);
    drop(rx);

    inbound.unbounded_send(heartbeat("BTC-USD", 1)).unwrap();

    let exit = client.receive(tx, CancellationToken::new()).await.unwrap();
    assert_eq!(exit, ReceiveExit::EngineClosed);
}

#[tokio::test]
async fn transport_error_is_returned() {
    let (mut client, inbound, _wire) = client(&["BTC-USD"]);
    let (tx, _rx) = mpsc::channel(4);

    inbound
        .unbounded_send(Err(tungstenite::Error::ConnectionClosed))
        .unwrap();

    let err = client.receive(tx, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, FeedError::Ws(_)));
}

#[tokio::test]
async fn close_shuts_the_write_half() {
    let (mut client, _inbound, mut wire) = client(&["BTC-USD"]);

    client.close().await.unwrap();
    assert!(wire.next().await.is_none());
}
