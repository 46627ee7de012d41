//! Periodic aggregation job
//!
//! Each run reads the record store, folds the descriptions through the word
//! frequency aggregator and posts one summary to the chat channel. Runs are
//! single-flight: the next tick is only awaited after the previous run has
//! finished, and missed ticks are delayed rather than burst.

use crate::aggregator::{aggregate, aggregate_descriptions, AggregateSummary};
use crate::config::JobSource;
use crate::notifier::{NotifyError, Notifier};
use crate::shutdown::{self, ShutdownReceiver};
use crate::store::{FetchError, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Store was empty; nothing was sent
    NoRows,
    /// One summary was sent
    Notified(AggregateSummary),
}

#[derive(Debug)]
pub enum JobError {
    Fetch(FetchError),
    Notify(NotifyError),
}

impl From<FetchError> for JobError {
    fn from(err: FetchError) -> Self {
        JobError::Fetch(err)
    }
}

impl From<NotifyError> for JobError {
    fn from(err: NotifyError) -> Self {
        JobError::Notify(err)
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::Fetch(e) => write!(f, "Failed to read record store: {}", e),
            JobError::Notify(e) => write!(f, "Failed to send summary: {}", e),
        }
    }
}

impl std::error::Error for JobError {}

pub struct AggregationJob {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    source: JobSource,
}

impl AggregationJob {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>, source: JobSource) -> Self {
        Self {
            store,
            notifier,
            source,
        }
    }

    /// One fetch → aggregate → notify pass
    pub async fn run_once(&mut self) -> Result<JobOutcome, JobError> {
        let summary = match self.source {
            JobSource::Records => {
                let records = self.store.fetch_all().await?;
                if records.is_empty() {
                    log::info!("📭 No rows found");
                    return Ok(JobOutcome::NoRows);
                }
                aggregate(&records)
            }
            JobSource::Descriptions => {
                let descriptions = self.store.query_descriptions().await?;
                if descriptions.is_empty() {
                    log::info!("📭 No rows found");
                    return Ok(JobOutcome::NoRows);
                }
                aggregate_descriptions(&descriptions)
            }
        };

        log::info!("📊 Aggregated {} records", summary.record_count);
        log::info!("   ├─ Longest description: {}", summary.longest_description);
        log::info!("   ├─ Most occurring word: {}", summary.mode_word);
        log::info!("   └─ Least occurring word(s): {}", summary.least_frequent_words.join(", "));

        self.notifier.send(&summary.to_message()).await?;

        log::info!("✅ Summary sent");
        Ok(JobOutcome::Notified(summary))
    }
}

/// Aggregation scheduler task - run the job every `period` until shutdown
///
/// The first run happens immediately. Failures are logged and the job waits
/// for the next tick; nothing is retried within a tick.
pub async fn aggregation_scheduler_task(
    mut job: AggregationJob,
    period: Duration,
    mut shutdown_rx: ShutdownReceiver,
) {
    log::info!(
        "⏰ Starting aggregation scheduler (interval: {}ms, {} store)",
        period.as_millis(),
        job.store.backend_type()
    );

    // tokio intervals panic on a zero period
    let mut timer = interval(period.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = shutdown::requested(&mut shutdown_rx) => break,
        }

        let result = tokio::select! {
            result = job.run_once() => result,
            _ = shutdown::requested(&mut shutdown_rx) => break,
        };

        match result {
            Ok(JobOutcome::NoRows) => {}
            Ok(JobOutcome::Notified(summary)) => {
                log::debug!("✅ Aggregation run covered {} records", summary.record_count);
            }
            Err(JobError::Fetch(e)) => {
                log::error!("❌ Aggregation skipped, store read failed: {}", e);
            }
            Err(JobError::Notify(e)) => {
                log::warn!("⚠️  Aggregation summary not delivered: {}", e);
            }
        }
    }

    log::info!("✅ Aggregation scheduler stopped");
}
