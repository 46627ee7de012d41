//! Pipeline configuration from environment variables
//!
//! Every binary loads `.env` (via `dotenv`) and then calls
//! `PipelineConfig::from_env()`. Malformed values are a `ConfigError`; absent
//! values fall back to the defaults below.
//!
//! Environment variables:
//! - `BILLFLOW_DB_PATH` (default: data/billflow.db) - record store and channel
//! - `BILLFLOW_SERVICES` (default: AmazonEC2,Google Cloud,Azure,AWS Lambda,Heroku)
//! - `NOTIFY_WEBHOOK_URL` (required by the consumer and aggregation job)
//! - `PRODUCE_INTERVAL_MS` (default: 1000)
//! - `COST_UPPER_BOUND` (default: 1000.0)
//! - `CHANNEL_TOPIC` (default: Shark)
//! - `CHANNEL_SUBSCRIPTION` (default: Shark-sub, overridden by `--subscription`)
//! - `ACK_DEADLINE_MS` (default: 60000)
//! - `NACK_DELAY_MS` (default: 0)
//! - `ACKED_RETENTION_MS` (default: 600000) - how long acked deliveries stay queryable
//! - `POLL_INTERVAL_MS` (default: 500)
//! - `NOTIFY_INTERVAL_MS` (default: 60000)
//! - `NOTIFY_MODE` (default: blocking) - `blocking` or `queued`
//! - `NOTIFY_QUEUE_SIZE` (default: 100)
//! - `AGGREGATION_INTERVAL_MS` (default: 60000)
//! - `AGGREGATION_SOURCE` (default: descriptions) - `descriptions` or `records`

use crate::channel::ChannelSettings;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SERVICES: [&str; 5] = ["AmazonEC2", "Google Cloud", "Azure", "AWS Lambda", "Heroku"];
pub const DEFAULT_SUBSCRIPTION: &str = "Shark-sub";

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How the consumer hands notifications to the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    /// Handler waits for its permit before acking
    Blocking,
    /// Handler enqueues and acks immediately
    Queued,
}

impl FromStr for NotifyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "blocking" => Ok(NotifyMode::Blocking),
            "queued" => Ok(NotifyMode::Queued),
            other => Err(ConfigError::InvalidValue(format!(
                "NOTIFY_MODE must be 'blocking' or 'queued', got '{}'",
                other
            ))),
        }
    }
}

/// Which store query feeds the aggregation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSource {
    Records,
    Descriptions,
}

impl FromStr for JobSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "records" => Ok(JobSource::Records),
            "descriptions" => Ok(JobSource::Descriptions),
            other => Err(ConfigError::InvalidValue(format!(
                "AGGREGATION_SOURCE must be 'records' or 'descriptions', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// SQLite file shared by the record store and the channel
    pub db_path: String,
    pub services: Vec<String>,
    notify_endpoint: Option<String>,

    pub produce_interval: Duration,
    pub cost_upper_bound: f64,

    pub topic: String,
    pub subscription: String,
    pub ack_deadline: Duration,
    pub nack_delay: Duration,
    pub acked_retention: Duration,
    pub poll_interval: Duration,

    pub notify_interval: Duration,
    pub notify_mode: NotifyMode,
    pub notify_queue_size: usize,

    pub aggregation_interval: Duration,
    pub aggregation_source: JobSource,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; `from_env` passes `std::env`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let services = match var("BILLFLOW_SERVICES") {
            Some(raw) => parse_services(&raw),
            None => DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
        };
        if services.is_empty() {
            return Err(ConfigError::InvalidValue(
                "BILLFLOW_SERVICES must name at least one service".to_string(),
            ));
        }

        let cost_upper_bound: f64 = parse_or(&var, "COST_UPPER_BOUND", 1000.0)?;
        if !cost_upper_bound.is_finite() || cost_upper_bound <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "COST_UPPER_BOUND must be a positive number, got {}",
                cost_upper_bound
            )));
        }

        let notify_queue_size: usize = parse_or(&var, "NOTIFY_QUEUE_SIZE", 100)?;
        if notify_queue_size == 0 {
            return Err(ConfigError::InvalidValue(
                "NOTIFY_QUEUE_SIZE must be greater than 0".to_string(),
            ));
        }

        let subscription = var("CHANNEL_SUBSCRIPTION").unwrap_or_else(|| DEFAULT_SUBSCRIPTION.to_string());

        Ok(Self {
            db_path: var("BILLFLOW_DB_PATH").unwrap_or_else(|| "data/billflow.db".to_string()),
            services,
            notify_endpoint: var("NOTIFY_WEBHOOK_URL"),
            produce_interval: positive_ms(&var, "PRODUCE_INTERVAL_MS", 1_000)?,
            cost_upper_bound,
            topic: var("CHANNEL_TOPIC").unwrap_or_else(|| "Shark".to_string()),
            subscription,
            ack_deadline: positive_ms(&var, "ACK_DEADLINE_MS", 60_000)?,
            nack_delay: Duration::from_millis(parse_or(&var, "NACK_DELAY_MS", 0)?),
            acked_retention: Duration::from_millis(parse_or(&var, "ACKED_RETENTION_MS", 600_000)?),
            poll_interval: positive_ms(&var, "POLL_INTERVAL_MS", 500)?,
            notify_interval: positive_ms(&var, "NOTIFY_INTERVAL_MS", 60_000)?,
            notify_mode: parse_or(&var, "NOTIFY_MODE", NotifyMode::Blocking)?,
            notify_queue_size,
            aggregation_interval: positive_ms(&var, "AGGREGATION_INTERVAL_MS", 60_000)?,
            aggregation_source: parse_or(&var, "AGGREGATION_SOURCE", JobSource::Descriptions)?,
        })
    }

    /// Webhook endpoint; only the binaries that notify require it
    pub fn notify_endpoint(&self) -> Result<&str, ConfigError> {
        let endpoint = self
            .notify_endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("NOTIFY_WEBHOOK_URL".to_string()))?;

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "NOTIFY_WEBHOOK_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(endpoint)
    }

    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            topic: self.topic.clone(),
            ack_deadline: self.ack_deadline,
            nack_delay: self.nack_delay,
            acked_retention: self.acked_retention,
        }
    }

    /// Apply `--subscription <name>` from the command line, if present
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(subscription) = parse_subscription_from_args(args)? {
            self.subscription = subscription;
        }
        Ok(())
    }
}

/// `--subscription <name>`; a flag without a usable name is rejected
pub fn parse_subscription_from_args(args: &[String]) -> Result<Option<String>, ConfigError> {
    match args.iter().position(|x| x == "--subscription") {
        Some(idx) => match args.get(idx + 1).map(|s| s.trim()) {
            Some(name) if !name.is_empty() && !name.starts_with("--") => Ok(Some(name.to_string())),
            _ => Err(ConfigError::InvalidValue(
                "--subscription requires a non-empty name".to_string(),
            )),
        },
        None => Ok(None),
    }
}

/// Comma-separated, trimmed, duplicates removed (first occurrence kept)
fn parse_services(raw: &str) -> Vec<String> {
    let mut services: Vec<String> = Vec::new();
    for service in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !services.iter().any(|s| s == service) {
            services.push(service.to_string());
        }
    }
    services
}

fn parse_or<V, T>(var: &V, key: &str, default: T) -> Result<T, ConfigError>
where
    V: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn positive_ms<V>(var: &V, key: &str, default_ms: u64) -> Result<Duration, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let ms: u64 = parse_or(var, key, default_ms)?;
    if ms == 0 {
        return Err(ConfigError::InvalidValue(format!("{} must be greater than 0", key)));
    }
    Ok(Duration::from_millis(ms))
}
