//! billflow - billing record pipeline
//!
//! ```text
//! Producer ──publish──▶ Channel ──subscribe──▶ RecordHandler ──▶ RecordStore
//!                                                   │
//!                                                   └──▶ RateLimitedNotifier ──▶ webhook
//!
//! AggregationJob (every tick): RecordStore ──▶ WordFrequencyAggregator ──▶ webhook
//! ```

pub mod aggregator;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod error_handler;
pub mod notifier;
pub mod producer;
pub mod record;
pub mod scheduler;
pub mod shutdown;
pub mod sqlite_pragma;
pub mod store;
