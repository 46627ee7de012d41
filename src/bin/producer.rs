//! Producer - publishes one synthetic billing record per tick
//!
//! Usage:
//!   cargo run --release --bin producer
//!
//! Environment variables:
//!   BILLFLOW_DB_PATH - SQLite file holding the channel (default: data/billflow.db)
//!   CHANNEL_TOPIC - Topic to publish to (default: Shark)
//!   BILLFLOW_SERVICES - Comma-separated service names
//!   PRODUCE_INTERVAL_MS - Publish interval (default: 1000)
//!   COST_UPPER_BOUND - Exclusive upper bound for generated costs (default: 1000.0)

use billflow::channel::{ChannelTransport, SqliteChannel};
use billflow::config::PipelineConfig;
use billflow::producer::Producer;
use billflow::shutdown;
use dotenv::dotenv;
use env_logger::Env;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = PipelineConfig::from_env()?;

    info!("🚀 Record Producer");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Topic: {}", config.topic);
    info!("   ├─ Services: {}", config.services.join(", "));
    info!("   └─ Interval: {}ms", config.produce_interval.as_millis());

    let transport: Arc<dyn ChannelTransport> = Arc::new(SqliteChannel::new(
        &config.db_path,
        config.channel_settings(),
    )?);
    let producer = Producer::from_config(transport, &config)?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(shutdown::on_ctrl_c(shutdown_tx));

    info!("🔄 Press CTRL+C to shutdown gracefully");
    producer.run(config.produce_interval, shutdown_rx).await;

    info!("✅ Producer stopped");
    Ok(())
}
