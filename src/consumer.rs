//! Record consumer: the `MessageHandler` behind the subscription loop
//!
//! Per delivery:
//! 1. decode the payload; a malformed record is nacked for redelivery
//! 2. persist it to the record store (when one is attached); a failed write is
//!    nacked
//! 3. notify the chat channel through the rate limiter; notification is
//!    best-effort and never affects the ack
//! 4. ack

use crate::channel::{AckDecision, ChannelMessage, MessageHandler, MessageId};
use crate::notifier::{QueuedNotifier, RateLimitedNotifier};
use crate::record::Record;
use crate::store::RecordStore;
use async_trait::async_trait;
use std::sync::Arc;

/// How a handled record reaches the rate-limited notifier
pub enum NotifyPath {
    /// Wait for the permit inside the handler, then ack
    Blocking(Arc<RateLimitedNotifier>),
    /// Enqueue and ack immediately; dropped with a warning when the queue is full
    Queued(QueuedNotifier),
}

pub struct RecordHandler {
    store: Option<Arc<dyn RecordStore>>,
    notify_path: NotifyPath,
}

impl RecordHandler {
    pub fn new(store: Option<Arc<dyn RecordStore>>, notify_path: NotifyPath) -> Self {
        Self { store, notify_path }
    }

    async fn notify(&self, message_id: MessageId, text: String) {
        match &self.notify_path {
            NotifyPath::Blocking(limiter) => {
                if let Err(e) = limiter.send_throttled(&text).await {
                    log::warn!("⚠️  Notification for message {} failed: {}", message_id, e);
                }
            }
            NotifyPath::Queued(queue) => {
                if let Err(e) = queue.enqueue(text) {
                    log::warn!("⚠️  Notification for message {} dropped: {}", message_id, e);
                }
            }
        }
    }
}

/// Chat text for one consumed record
pub fn format_notification(message_id: MessageId, record: &Record) -> String {
    format!(
        "Message ID: {}\nDate: {}\nService: {}\nDescription: {}\nCost: {:.2}",
        message_id,
        record.date(),
        record.service(),
        record.description(),
        record.cost()
    )
}

#[async_trait]
impl MessageHandler for RecordHandler {
    async fn handle(&self, message: &ChannelMessage) -> AckDecision {
        let record = match Record::decode(&message.payload) {
            Ok(record) => record,
            Err(e) => {
                log::warn!(
                    "⚠️  Message {} (attempt {}) could not be decoded, nacking: {}",
                    message.message_id,
                    message.attempt,
                    e
                );
                return AckDecision::Nack;
            }
        };

        log::info!(
            "📥 Message {}: {} | {} | {} | {:.2}",
            message.message_id,
            record.date(),
            record.service(),
            record.description(),
            record.cost()
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&record).await {
                log::error!(
                    "❌ Failed to persist message {} to {} store, nacking: {}",
                    message.message_id,
                    store.backend_type(),
                    e
                );
                return AckDecision::Nack;
            }
        }

        self.notify(message.message_id, format_notification(message.message_id, &record))
            .await;

        AckDecision::Ack
    }
}
