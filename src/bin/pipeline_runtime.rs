//! Pipeline Runtime - producer, consumer and aggregation job in one process
//!
//! This binary orchestrates the whole pipeline:
//! - Opens the shared SQLite database (channel + record store)
//! - Spawns the producer, the subscription consumer and the aggregation
//!   scheduler as independent tasks
//! - Fires one shutdown signal on CTRL+C and waits for every task to stop
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime
//!
//! Environment variables: see `billflow::config`. `NOTIFY_WEBHOOK_URL` is required.

use billflow::channel::{
    subscribe, ChannelTransport, SqliteChannel, SubscriptionSettings,
};
use billflow::config::{NotifyMode, PipelineConfig};
use billflow::consumer::{NotifyPath, RecordHandler};
use billflow::notifier::{Notifier, QueuedNotifier, RateLimitedNotifier, WebhookNotifier};
use billflow::producer::Producer;
use billflow::scheduler::{aggregation_scheduler_task, AggregationJob};
use billflow::shutdown;
use billflow::store::{RecordStore, SqliteRecordStore};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = PipelineConfig::from_env()?;
    let endpoint = config.notify_endpoint()?.to_string();

    info!("🚀 Pipeline Runtime");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Topic: {} → {}", config.topic, config.subscription);
    info!("   ├─ Produce interval: {}ms", config.produce_interval.as_millis());
    info!("   ├─ Notify interval: {}ms ({:?})", config.notify_interval.as_millis(), config.notify_mode);
    info!("   └─ Aggregation interval: {}ms", config.aggregation_interval.as_millis());

    // Initialize storage
    info!("🔧 Initializing database...");
    let channel = Arc::new(SqliteChannel::new(
        &config.db_path,
        config.channel_settings(),
    )?);
    // subscribe before the producer starts so the first records are not missed
    channel.create_subscription(&config.subscription).await?;
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.db_path)?);
    info!("✅ Database initialized");

    let webhook: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(endpoint)?);

    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    info!("🚀 Spawning background tasks...");

    // Task 1: Producer
    let producer = Producer::from_config(channel.clone(), &config)?;
    let produce_interval = config.produce_interval;
    let producer_rx = shutdown_rx.clone();
    let producer_task = tokio::spawn(async move {
        producer.run(produce_interval, producer_rx).await;
    });
    info!("   ├─ ✅ Producer task spawned");

    // Task 2: Consumer
    let limiter = Arc::new(RateLimitedNotifier::new(webhook.clone(), config.notify_interval));
    let (notify_path, drain_task) = match config.notify_mode {
        NotifyMode::Blocking => (NotifyPath::Blocking(limiter), None),
        NotifyMode::Queued => {
            let (queue, drain_task) = QueuedNotifier::spawn(limiter, config.notify_queue_size);
            (NotifyPath::Queued(queue), Some(drain_task))
        }
    };
    let handler = RecordHandler::new(Some(store.clone()), notify_path);
    let subscription = config.subscription.clone();
    let settings = SubscriptionSettings {
        poll_interval: config.poll_interval,
        ..SubscriptionSettings::default()
    };
    let consumer_channel = channel.clone();
    let consumer_rx = shutdown_rx.clone();
    let consumer_task = tokio::spawn(async move {
        let transport: &dyn ChannelTransport = consumer_channel.as_ref();
        if let Err(e) = subscribe(transport, &subscription, &handler, &settings, consumer_rx).await {
            error!("❌ Consumer failed: {}", e);
        }
    });
    info!("   ├─ ✅ Consumer task spawned");

    // Task 3: Aggregation job (plain notifier, not rate-limited)
    let job = AggregationJob::new(store, webhook, config.aggregation_source);
    let aggregation_interval = config.aggregation_interval;
    let aggregation_task = tokio::spawn(aggregation_scheduler_task(job, aggregation_interval, shutdown_rx));
    info!("   └─ ✅ Aggregation scheduler spawned");

    info!("🔄 Press CTRL+C to shutdown gracefully");
    shutdown::on_ctrl_c(shutdown_tx).await;

    for (name, task) in [
        ("producer", producer_task),
        ("consumer", consumer_task),
        ("aggregation", aggregation_task),
    ] {
        if let Err(e) = task.await {
            error!("❌ {} task panicked: {}", name, e);
        }
    }

    if let Some(drain_task) = drain_task {
        drain_task.abort();
    }

    info!("✅ Pipeline runtime stopped");
    Ok(())
}
