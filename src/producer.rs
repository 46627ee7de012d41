//! Record producer
//!
//! Generates one synthetic billing record per tick and publishes it to the
//! channel. Publishing is fire-and-forget: a rejected publish is logged and the
//! record is lost; the next tick proceeds normally.

use crate::channel::{ChannelTransport, MessageId};
use crate::config::{ConfigError, PipelineConfig};
use crate::record::{format_date, DecodeError, Record};
use crate::shutdown::{self, ShutdownReceiver};
use chrono::{Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Result of one generate-and-publish step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published(MessageId),
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub published: u64,
    pub dropped: u64,
}

pub struct Producer {
    transport: Arc<dyn ChannelTransport>,
    services: Vec<String>,
    cost_upper_bound: f64,
}

impl Producer {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        services: Vec<String>,
        cost_upper_bound: f64,
    ) -> Result<Self, ConfigError> {
        if services.is_empty() {
            return Err(ConfigError::InvalidValue("service list cannot be empty".to_string()));
        }
        if !cost_upper_bound.is_finite() || cost_upper_bound <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "cost upper bound must be positive, got {}",
                cost_upper_bound
            )));
        }

        Ok(Self {
            transport,
            services,
            cost_upper_bound,
        })
    }

    pub fn from_config(transport: Arc<dyn ChannelTransport>, config: &PipelineConfig) -> Result<Self, ConfigError> {
        Self::new(transport, config.services.clone(), config.cost_upper_bound)
    }

    /// Uniform service, uniform cost in `[0, cost_upper_bound)`
    pub fn generate_record<R: Rng>(&self, rng: &mut R, date: NaiveDate) -> Result<Record, DecodeError> {
        let service = self
            .services
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default();
        let cost = rng.gen_range(0.0..self.cost_upper_bound);

        Record::new(
            format_date(date),
            service,
            format!("This is a sample description for {}", service),
            cost,
        )
    }

    /// Generate today's record and publish it once
    pub async fn tick(&self) -> TickOutcome {
        let generated = {
            let mut rng = rand::thread_rng();
            self.generate_record(&mut rng, Local::now().date_naive())
        };

        let record = match generated {
            Ok(record) => record,
            Err(e) => {
                log::error!("❌ Failed to generate record: {}", e);
                return TickOutcome::Dropped;
            }
        };

        let payload = match record.encode() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("❌ Failed to encode record: {}", e);
                return TickOutcome::Dropped;
            }
        };

        match self.transport.publish(&payload).await {
            Ok(message_id) => {
                log::info!(
                    "📤 Published message {} ({}, cost {:.2})",
                    message_id,
                    record.service(),
                    record.cost()
                );
                TickOutcome::Published(message_id)
            }
            Err(e) => {
                log::error!("❌ Failed to publish message: {}", e);
                TickOutcome::Dropped
            }
        }
    }

    /// Tick every `period` until shutdown; the first tick fires immediately
    pub async fn run(&self, period: Duration, mut shutdown_rx: ShutdownReceiver) -> ProducerStats {
        log::info!(
            "🚀 Producer started ({} transport, every {}ms, {} services)",
            self.transport.backend_type(),
            period.as_millis(),
            self.services.len()
        );

        // tokio intervals panic on a zero period
        let mut timer = interval(period.max(Duration::from_millis(1)));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = ProducerStats::default();

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = shutdown::requested(&mut shutdown_rx) => break,
            }

            match self.tick().await {
                TickOutcome::Published(_) => stats.published += 1,
                TickOutcome::Dropped => stats.dropped += 1,
            }
        }

        log::info!(
            "✅ Producer stopped ({} published, {} dropped)",
            stats.published,
            stats.dropped
        );
        stats
    }
}
