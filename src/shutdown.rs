//! Process-wide shutdown signal shared by the producer, consumer and
//! aggregation loops

use tokio::sync::watch;

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

/// Resolves once shutdown has been requested
///
/// A dropped sender never counts as a shutdown request; the future then stays
/// pending forever.
pub async fn requested(rx: &mut ShutdownReceiver) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Fire the shutdown signal on CTRL+C
pub async fn on_ctrl_c(tx: ShutdownSender) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            log::info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            log::error!("❌ Failed to listen for CTRL+C: {}", err);
            return;
        }
    }
    let _ = tx.send(true);
}
