//! Channel transport contract
//!
//! At-least-once delivery between the producer and the consumer:
//! - `publish` resolves once the channel has durably accepted the payload
//! - every delivery attempt leases the message under a fresh `delivery_id`
//! - `ack` consumes the message permanently, `nack` makes it eligible for
//!   redelivery, and a lease that is never settled is redelivered once its ack
//!   deadline passes
//!
//! Delivery order across the queue is not guaranteed.

use async_trait::async_trait;
use std::str::FromStr;

pub type MessageId = i64;

#[derive(Debug)]
pub enum PublishError {
    Database(rusqlite::Error),
    Unavailable(String),
}

impl From<rusqlite::Error> for PublishError {
    fn from(err: rusqlite::Error) -> Self {
        PublishError::Database(err)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Database(e) => write!(f, "Publish rejected by channel: {}", e),
            PublishError::Unavailable(msg) => write!(f, "Channel unavailable: {}", msg),
        }
    }
}

impl std::error::Error for PublishError {}

#[derive(Debug)]
pub enum ChannelError {
    Database(rusqlite::Error),
    Unavailable(String),
    UnknownSubscription(String),
    /// A stored delivery state no variant maps to
    InvalidState(String),
}

impl From<rusqlite::Error> for ChannelError {
    fn from(err: rusqlite::Error) -> Self {
        ChannelError::Database(err)
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Database(e) => write!(f, "Channel database error: {}", e),
            ChannelError::Unavailable(msg) => write!(f, "Channel unavailable: {}", msg),
            ChannelError::UnknownSubscription(name) => write!(f, "Unknown subscription: {}", name),
            ChannelError::InvalidState(state) => write!(f, "Invalid delivery state: '{}'", state),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Handler verdict for one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    /// Delivery permanently consumed
    Ack,
    /// Eligible for redelivery after the nack delay
    Nack,
}

/// Settlement state of a message within one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Unacked,
    Acked,
    Nacked,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Unacked => "unacked",
            DeliveryState::Acked => "acked",
            DeliveryState::Nacked => "nacked",
        }
    }
}

impl FromStr for DeliveryState {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unacked" => Ok(DeliveryState::Unacked),
            "acked" => Ok(DeliveryState::Acked),
            "nacked" => Ok(DeliveryState::Nacked),
            other => Err(ChannelError::InvalidState(other.to_string())),
        }
    }
}

/// One leased delivery attempt
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Opaque, unique per attempt; redelivery of the same message gets a new one
    pub delivery_id: String,
    pub message_id: MessageId,
    /// 1 on first delivery
    pub attempt: u32,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Durably submit a payload to every subscription on the topic
    async fn publish(&self, payload: &[u8]) -> Result<MessageId, PublishError>;

    /// Idempotent; a new subscription only sees messages published after it
    async fn create_subscription(&self, subscription: &str) -> Result<(), ChannelError>;

    /// Lease the next deliverable message, if any
    async fn pull(&self, subscription: &str) -> Result<Option<ChannelMessage>, ChannelError>;

    /// Returns false when `delivery_id` is no longer the current lease
    async fn ack(&self, subscription: &str, delivery_id: &str) -> Result<bool, ChannelError>;

    /// Returns false when `delivery_id` is no longer the current lease
    async fn nack(&self, subscription: &str, delivery_id: &str) -> Result<bool, ChannelError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Called once per delivered message; must finish before the next delivery
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &ChannelMessage) -> AckDecision;
}
