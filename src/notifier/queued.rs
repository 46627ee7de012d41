//! Non-blocking notification queue
//!
//! `enqueue` uses `try_send` on a bounded channel and returns immediately; a
//! background drain task forwards queued texts through the rate limiter in
//! FIFO order. When the queue is full the text is rejected with
//! `NotifyError::QueueFull` and the caller decides what to log.

use super::{NotifyError, Notifier, RateLimitedNotifier};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<String>,
}

impl QueuedNotifier {
    /// Spawn the drain task; it exits once every `QueuedNotifier` clone is dropped
    /// and the queue is empty
    pub fn spawn<N>(limiter: Arc<RateLimitedNotifier<N>>, capacity: usize) -> (Self, JoinHandle<()>)
    where
        N: Notifier + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain(rx, limiter));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, text: String) -> Result<(), NotifyError> {
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotifyError::QueueClosed,
        })
    }

    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

async fn drain<N>(mut rx: mpsc::Receiver<String>, limiter: Arc<RateLimitedNotifier<N>>)
where
    N: Notifier + ?Sized,
{
    let mut sent = 0u64;
    let mut failed = 0u64;

    while let Some(text) = rx.recv().await {
        match limiter.send_throttled(&text).await {
            Ok(()) => sent += 1,
            Err(e) => {
                failed += 1;
                log::warn!("⚠️  Queued notification failed: {}", e);
            }
        }
    }

    log::info!("✅ Notification queue drained ({} sent, {} failed)", sent, failed);
}
