//! Aggregation Job - periodic word-frequency summary of the record store
//!
//! Usage:
//!   cargo run --release --bin aggregation_job
//!   cargo run --release --bin aggregation_job -- --once
//!
//! Environment variables:
//!   NOTIFY_WEBHOOK_URL - Chat webhook endpoint (required)
//!   BILLFLOW_DB_PATH - SQLite file holding the records (default: data/billflow.db)
//!   AGGREGATION_INTERVAL_MS - Interval between runs (default: 60000)
//!   AGGREGATION_SOURCE - descriptions | records (default: descriptions)

use billflow::config::PipelineConfig;
use billflow::notifier::{Notifier, WebhookNotifier};
use billflow::scheduler::{aggregation_scheduler_task, AggregationJob, JobOutcome};
use billflow::shutdown;
use billflow::store::{RecordStore, SqliteRecordStore};
use dotenv::dotenv;
use env_logger::Env;
use log::info;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = PipelineConfig::from_env()?;
    let endpoint = config.notify_endpoint()?.to_string();
    let run_once = env::args().any(|arg| arg == "--once");

    info!("🚀 Aggregation Job");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Source: {:?}", config.aggregation_source);
    info!("   └─ Interval: {}ms", config.aggregation_interval.as_millis());

    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.db_path)?);
    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(endpoint)?);
    let mut job = AggregationJob::new(store, notifier, config.aggregation_source);

    if run_once {
        match job.run_once().await? {
            JobOutcome::NoRows => info!("✅ Nothing to aggregate"),
            JobOutcome::Notified(summary) => info!("✅ Summary sent ({} records)", summary.record_count),
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(shutdown::on_ctrl_c(shutdown_tx));

    info!("🔄 Press CTRL+C to shutdown gracefully");
    aggregation_scheduler_task(job, config.aggregation_interval, shutdown_rx).await;

    info!("✅ Aggregation job stopped");
    Ok(())
}
