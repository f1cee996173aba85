use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coinbase::CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionAction::Subscribe => "subscribe",
            SubscriptionAction::Unsubscribe => "unsubscribe",
        }
    }
}

/// Outgoing `subscribe` / `unsubscribe` request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub action: SubscriptionAction,
    pub product_ids: Vec<String>,
    pub channels: Vec<String>,
}

impl SubscriptionRequest {
    pub fn new(action: SubscriptionAction, product_ids: &[String]) -> Self {
        Self {
            action,
            product_ids: product_ids.to_vec(),
            channels: CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// `ticker` frame. Price and size arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerMessage {
    pub sequence: i64,
    pub product_id: String,
    pub price: String,
    pub last_size: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatMessage {
    pub sequence: i64,
    pub product_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelSubscription {
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Subscription acknowledgement listing the active channels.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionsMessage {
    #[serde(default)]
    pub channels: Vec<ChannelSubscription>,
}
