//! Channel Transport - durable at-least-once delivery between the record
//! producer and the record consumer
//!
//! # Architecture
//!
//! ```text
//! Producer ──publish──▶ channel_messages ──fanout──▶ channel_deliveries (per subscription)
//!                                                        │
//!                              subscribe(): pull → MessageHandler → ack / nack
//! ```

pub mod sqlite_channel;
pub mod subscriber;
pub mod transport;

pub use sqlite_channel::{ChannelSettings, SqliteChannel};
pub use subscriber::{subscribe, SubscriptionSettings, SubscriptionStats};
pub use transport::{
    AckDecision, ChannelError, ChannelMessage, ChannelTransport, DeliveryState, MessageHandler,
    MessageId, PublishError,
};
