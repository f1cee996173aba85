//! Coinbase feed frame decoder.
//!
//! Every frame on the public feed is a JSON object whose `"type"` field names
//! its shape:
//!
//! ```jsonc
//! { "type": "heartbeat", "sequence": 90, "product_id": "BTC-USD", ... }
//! { "type": "ticker", "sequence": 91, "product_id": "BTC-USD",
//!   "price": "333.99", "last_size": "0.03", "time": "2014-11-07T08:19:28.464459Z", ... }
//! ```
//!
//! The decoder maps each frame into a [`FeedMessage`]:
//!
//! - **Market** – a `ticker` (as a trade) or a `heartbeat`, ready for the engine
//! - **Subscriptions** – acknowledgement of a subscribe / unsubscribe request
//! - **Error** – the server rejected something; carries `message` and `reason`
//! - **Unknown** – any other `type`, kept by name for diagnostics
//!
//! Decoding is stateless. Malformed JSON, a missing `type` and non-numeric
//! price or size strings are errors; the caller decides whether to skip the
//! frame or abort.

use corelib::models::{Heartbeat, MarketEvent, TradeEvent};
use serde_json::Value;

use crate::coinbase::error::DecodeError;
use crate::coinbase::types::{
    ChannelSubscription, ErrorMessage, HeartbeatMessage, SubscriptionsMessage, TickerMessage,
};

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Market(MarketEvent),
    Subscriptions(Vec<ChannelSubscription>),
    Error { message: String, reason: String },
    Unknown(String),
}

pub fn decode_feed_message(raw: &str) -> Result<FeedMessage, DecodeError> {
    let json: Value = serde_json::from_str(raw)?;

    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_owned();

    match kind.as_str() {
        "ticker" => {
            let ticker: TickerMessage = serde_json::from_value(json)?;
            Ok(FeedMessage::Market(ticker.into_trade()?.into()))
        }
        "heartbeat" => {
            let hb: HeartbeatMessage = serde_json::from_value(json)?;
            Ok(FeedMessage::Market(
                Heartbeat::new(hb.product_id, hb.sequence).into(),
            ))
        }
        "subscriptions" => {
            let ack: SubscriptionsMessage = serde_json::from_value(json)?;
            Ok(FeedMessage::Subscriptions(ack.channels))
        }
        "error" => {
            let err: ErrorMessage = serde_json::from_value(json)?;
            Ok(FeedMessage::Error {
                message: err.message,
                reason: err.reason,
            })
        }
        _ => Ok(FeedMessage::Unknown(kind)),
    }
}

impl TickerMessage {
    pub fn into_trade(self) -> Result<TradeEvent, DecodeError> {
        let price = parse_decimal("price", &self.price)?;
        let volume = parse_decimal("last_size", &self.last_size)?;

        Ok(TradeEvent::new(
            self.product_id,
            self.sequence,
            price,
            volume,
            self.time,
        ))
    }
}

fn parse_decimal(field: &'static str, value: &str) -> Result<f64, DecodeError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidNumber {
            field,
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    // ---------------------------------------------------------------------------
    // Heartbeat, as documented by the exchange
    // ---------------------------------------------------------------------------
    #[test]
    fn parse_heartbeat() {
        let raw = r#"{
            "type": "heartbeat",
            "sequence": 90,
            "last_trade_id": 20,
            "product_id": "BTC-USD",
            "time": "2014-11-07T08:19:28.464459Z"
        }"#;

        let msg = decode_feed_message(raw).unwrap();
        assert_eq!(
            msg,
            FeedMessage::Market(Heartbeat::new("BTC-USD", 90).into())
        );
    }

    #[test]
    fn parse_ticker_into_trade() {
        let raw = json!({
            "type": "ticker",
            "sequence": 91,
            "product_id": "ETH-USD",
            "price": "4010.25",
            "open_24h": "3900.00",
            "best_bid": "4010.20",
            "side": "buy",
            "last_size": "0.015",
            "time": "2014-11-07T08:19:28.464459Z",
            "trade_id": 7
        })
        .to_string();

        let FeedMessage::Market(MarketEvent::Trade(trade)) = decode_feed_message(&raw).unwrap()
        else {
            panic!("expected a trade");
        };

        assert_eq!(trade.instrument_id, "ETH-USD");
        assert_eq!(trade.sequence, 91);
        assert_eq!(trade.price, 4010.25);
        assert_eq!(trade.volume, 0.015);
        assert_eq!(
            trade.timestamp,
            Utc.with_ymd_and_hms(2014, 11, 7, 8, 19, 28).unwrap()
                + chrono::Duration::microseconds(464_459)
        );
    }

    #[test]
    fn parse_subscription_ack() {
        let raw = json!({
            "type": "subscriptions",
            "channels": [
                { "name": "heartbeat", "product_ids": ["BTC-USD"] },
                { "name": "ticker", "product_ids": ["BTC-USD"] }
            ]
        })
        .to_string();

        let FeedMessage::Subscriptions(channels) = decode_feed_message(&raw).unwrap() else {
            panic!("expected subscriptions");
        };
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].name, "ticker");
        assert_eq!(channels[1].product_ids, vec!["BTC-USD".to_string()]);
    }

    #[test]
    fn parse_error_message() {
        let raw = r#"{"type":"error","message":"Failed to subscribe","reason":"BAD-PAIR is not a valid product"}"#;

        assert_eq!(
            decode_feed_message(raw).unwrap(),
            FeedMessage::Error {
                message: "Failed to subscribe".into(),
                reason: "BAD-PAIR is not a valid product".into(),
            }
        );
    }

    #[test]
    fn error_without_reason_defaults_to_empty() {
        let raw = r#"{"type":"error","message":"boom"}"#;

        let FeedMessage::Error { reason, .. } = decode_feed_message(raw).unwrap() else {
            panic!("expected error");
        };
        assert!(reason.is_empty());
    }

    // ---------------------------------------------------------------------------
    // Forward compatibility: unknown types are surfaced by name
    // ---------------------------------------------------------------------------
    #[test]
    fn parse_unknown_type() {
        let raw = r#"{"type":"l2update","product_id":"BTC-USD","changes":[]}"#;

        assert_eq!(
            decode_feed_message(raw).unwrap(),
            FeedMessage::Unknown("l2update".into())
        );
    }

    #[test]
    fn missing_type_is_an_error() {
        let err = decode_feed_message(r#"{"sequence":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = decode_feed_message("{ this is not json").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn non_numeric_price_is_an_error() {
        let raw = json!({
            "type": "ticker",
            "sequence": 1,
            "product_id": "BTC-USD",
            "price": "abc",
            "last_size": "1",
            "time": "2014-11-07T08:19:28Z"
        })
        .to_string();

        match decode_feed_message(&raw).unwrap_err() {
            DecodeError::InvalidNumber { field, value } => {
                assert_eq!(field, "price");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn ticker_missing_fields_is_an_error() {
        let raw = r#"{"type":"ticker","sequence":1,"product_id":"BTC-USD"}"#;
        assert!(matches!(
            decode_feed_message(raw).unwrap_err(),
            DecodeError::Json(_)
        ));
    }
}
