//! Subscription driver: pull → handle → settle, one message at a time
//!
//! The handler is awaited to completion before the next pull, so a slow handler
//! (for example one blocked on the notification rate limiter) throttles
//! consumption directly. There is no upper bound on handler duration.
//!
//! Shutdown interrupts a blocked handler without settling its message; the
//! lease expires and the message is redelivered later.

use super::transport::{AckDecision, ChannelError, ChannelTransport, MessageHandler};
use crate::error_handler::ExponentialBackoff;
use crate::shutdown::{self, ShutdownReceiver};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    /// Sleep between pulls when nothing is deliverable
    pub poll_interval: Duration,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub acked: u64,
    pub nacked: u64,
}

/// Drive `handler` over `subscription` until shutdown
///
/// Creates the subscription if needed. Pull and settle failures are logged and
/// retried with exponential backoff; only a failure to create the subscription
/// is returned.
pub async fn subscribe<T, H>(
    transport: &T,
    subscription: &str,
    handler: &H,
    settings: &SubscriptionSettings,
    mut shutdown_rx: ShutdownReceiver,
) -> Result<SubscriptionStats, ChannelError>
where
    T: ChannelTransport + ?Sized,
    H: MessageHandler + ?Sized,
{
    transport.create_subscription(subscription).await?;

    log::info!(
        "🚀 Subscribed to {} ({} transport, poll every {}ms)",
        subscription,
        transport.backend_type(),
        settings.poll_interval.as_millis()
    );

    let mut backoff = ExponentialBackoff::new(settings.backoff_initial_ms, settings.backoff_max_ms);
    let mut stats = SubscriptionStats::default();

    loop {
        let pulled = tokio::select! {
            result = transport.pull(subscription) => result,
            _ = shutdown::requested(&mut shutdown_rx) => break,
        };

        let message = match pulled {
            Ok(Some(message)) => {
                backoff.reset();
                message
            }
            Ok(None) => {
                backoff.reset();
                tokio::select! {
                    _ = sleep(settings.poll_interval) => continue,
                    _ = shutdown::requested(&mut shutdown_rx) => break,
                }
            }
            Err(e) => {
                log::error!("❌ Pull from {} failed: {}", subscription, e);
                tokio::select! {
                    _ = backoff.sleep() => continue,
                    _ = shutdown::requested(&mut shutdown_rx) => break,
                }
            }
        };

        let decision = tokio::select! {
            decision = handler.handle(&message) => decision,
            _ = shutdown::requested(&mut shutdown_rx) => {
                log::warn!(
                    "⚠️  Shutdown while handling message {} (attempt {}), left unacked for redelivery",
                    message.message_id,
                    message.attempt
                );
                break;
            }
        };

        let settled = match decision {
            AckDecision::Ack => transport.ack(subscription, &message.delivery_id).await,
            AckDecision::Nack => transport.nack(subscription, &message.delivery_id).await,
        };

        match settled {
            Ok(true) => match decision {
                AckDecision::Ack => stats.acked += 1,
                AckDecision::Nack => stats.nacked += 1,
            },
            Ok(false) => {
                log::warn!(
                    "⚠️  Delivery {} expired before {:?}; message will be redelivered",
                    message.delivery_id,
                    decision
                );
            }
            Err(e) => {
                log::error!("❌ Failed to settle delivery {}: {}", message.delivery_id, e);
            }
        }
    }

    log::info!(
        "✅ Subscription {} stopped ({} acked, {} nacked)",
        subscription,
        stats.acked,
        stats.nacked
    );

    Ok(stats)
}
