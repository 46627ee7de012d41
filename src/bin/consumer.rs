//! Consumer - drains a subscription, persists records and posts each one to
//! the chat webhook through the rate limiter
//!
//! Usage:
//!   cargo run --release --bin consumer -- --subscription Shark-sub
//!
//! Environment variables:
//!   NOTIFY_WEBHOOK_URL - Chat webhook endpoint (required)
//!   BILLFLOW_DB_PATH - SQLite file holding the channel and records (default: data/billflow.db)
//!   CHANNEL_SUBSCRIPTION - Subscription name when no flag is given (default: Shark-sub)
//!   NOTIFY_INTERVAL_MS - Minimum gap between notifications (default: 60000)
//!   NOTIFY_MODE - blocking | queued (default: blocking)

use billflow::channel::{subscribe, SqliteChannel, SubscriptionSettings};
use billflow::config::{NotifyMode, PipelineConfig};
use billflow::consumer::{NotifyPath, RecordHandler};
use billflow::notifier::{Notifier, QueuedNotifier, RateLimitedNotifier, WebhookNotifier};
use billflow::shutdown;
use billflow::store::{RecordStore, SqliteRecordStore};
use dotenv::dotenv;
use env_logger::Env;
use log::{info, warn};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut config = PipelineConfig::from_env()?;
    let args: Vec<String> = env::args().collect();
    config.apply_args(&args)?;
    let endpoint = config.notify_endpoint()?.to_string();

    info!("🚀 Record Consumer");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Subscription: {} (topic {})", config.subscription, config.topic);
    info!("   ├─ Notify interval: {}ms", config.notify_interval.as_millis());
    info!("   └─ Notify mode: {:?}", config.notify_mode);

    let channel = SqliteChannel::new(
        &config.db_path,
        config.channel_settings(),
    )?;
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.db_path)?);

    let webhook: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(endpoint)?);
    let limiter = Arc::new(RateLimitedNotifier::new(webhook, config.notify_interval));

    let (notify_path, drain_task) = match config.notify_mode {
        NotifyMode::Blocking => (NotifyPath::Blocking(limiter), None),
        NotifyMode::Queued => {
            let (queue, drain_task) = QueuedNotifier::spawn(limiter, config.notify_queue_size);
            (NotifyPath::Queued(queue), Some(drain_task))
        }
    };
    let handler = RecordHandler::new(Some(store), notify_path);

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(shutdown::on_ctrl_c(shutdown_tx));

    info!("🔄 Press CTRL+C to shutdown gracefully");
    let settings = SubscriptionSettings {
        poll_interval: config.poll_interval,
        ..SubscriptionSettings::default()
    };
    let stats = subscribe(&channel, &config.subscription, &handler, &settings, shutdown_rx).await?;

    if let Some(drain_task) = drain_task {
        // pending notifications would each wait a full interval; abandon them
        drain_task.abort();
        warn!("⚠️  Queued notifications discarded on shutdown");
    }

    info!("✅ Consumer stopped ({} acked, {} nacked)", stats.acked, stats.nacked);
    Ok(())
}
