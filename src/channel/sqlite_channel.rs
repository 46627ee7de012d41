//! SQLite-backed topic/subscription channel
//!
//! Tables:
//! - `channel_messages` - published payloads, kept while any subscription still
//!   holds a delivery row for them
//! - `channel_subscriptions` - subscription name → topic
//! - `channel_deliveries` - per (subscription, message) lease state
//!
//! A delivery row is deliverable when it is not acked and `available_at <= now`.
//! Leasing pushes `available_at` out by the ack deadline, so a consumer that
//! dies mid-message gets the message back once the deadline passes. Nack pulls
//! `available_at` in to `now + nack_delay`.
//!
//! Acked deliveries are kept for `acked_retention` (so their state stays
//! observable) and trimmed on later acks; a message is deleted as soon as no
//! delivery row references it.

use super::transport::{
    ChannelError, ChannelMessage, ChannelTransport, DeliveryState, MessageId, PublishError,
};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub topic: String,
    /// Lease length before an unsettled delivery is redelivered
    pub ack_deadline: Duration,
    /// Delay before a nacked delivery becomes deliverable again
    pub nack_delay: Duration,
    /// How long acked delivery rows are kept before they are trimmed
    pub acked_retention: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            topic: "Shark".to_string(),
            ack_deadline: Duration::from_secs(60),
            nack_delay: Duration::from_millis(0),
            acked_retention: Duration::from_secs(600),
        }
    }
}

pub struct SqliteChannel {
    conn: Arc<Mutex<Connection>>,
    settings: ChannelSettings,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl SqliteChannel {
    pub fn new(db_path: impl AsRef<Path>, settings: ChannelSettings) -> Result<Self, ChannelError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ChannelError::Unavailable(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        apply_optimized_pragmas(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS channel_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic TEXT NOT NULL,
                payload BLOB NOT NULL,
                published_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS channel_subscriptions (
                name TEXT PRIMARY KEY,
                topic TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS channel_deliveries (
                subscription TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                state TEXT NOT NULL DEFAULT 'unacked',
                attempts INTEGER NOT NULL DEFAULT 0,
                delivery_id TEXT,
                available_at INTEGER NOT NULL,
                PRIMARY KEY (subscription, message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_deliveries_available
                ON channel_deliveries(subscription, state, available_at);
            CREATE INDEX IF NOT EXISTS idx_deliveries_delivery_id
                ON channel_deliveries(subscription, delivery_id);
            CREATE INDEX IF NOT EXISTS idx_deliveries_message
                ON channel_deliveries(message_id);",
        )?;

        log::info!(
            "✅ SQLite channel initialized (topic: {}, ack deadline: {}ms)",
            settings.topic,
            settings.ack_deadline.as_millis()
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            settings,
        })
    }

    pub fn topic(&self) -> &str {
        &self.settings.topic
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ChannelError> {
        self.conn
            .lock()
            .map_err(|_| ChannelError::Unavailable("connection mutex poisoned".to_string()))
    }

    /// Current settlement state of `message_id` in `subscription`
    pub fn delivery_state(
        &self,
        subscription: &str,
        message_id: MessageId,
    ) -> Result<Option<DeliveryState>, ChannelError> {
        let conn = self.lock()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM channel_deliveries WHERE subscription = ?1 AND message_id = ?2",
                params![subscription, message_id],
                |row| row.get(0),
            )
            .optional()?;
        state.map(|s| s.parse()).transpose()
    }

    /// Messages in `subscription` that have not been acked yet
    pub fn backlog(&self, subscription: &str) -> Result<u64, ChannelError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM channel_deliveries WHERE subscription = ?1 AND state != 'acked'",
            params![subscription],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn settle(
        &self,
        subscription: &str,
        delivery_id: &str,
        state: DeliveryState,
        available_at: i64,
    ) -> Result<bool, ChannelError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE channel_deliveries
             SET state = ?1, available_at = ?2
             WHERE subscription = ?3 AND delivery_id = ?4 AND state = 'unacked'",
            params![state.as_str(), available_at, subscription, delivery_id],
        )?;

        if changed == 1 && state == DeliveryState::Acked {
            trim_acked(&tx, now_ms().saturating_sub(duration_ms(self.settings.acked_retention)))?;
        }
        tx.commit()?;

        Ok(changed == 1)
    }

    /// Trim acked deliveries past retention and messages nothing references;
    /// returns the number of deliveries removed
    pub fn prune(&self) -> Result<usize, ChannelError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let trimmed = trim_acked(&tx, now_ms().saturating_sub(duration_ms(self.settings.acked_retention)))?;
        tx.commit()?;
        Ok(trimmed)
    }

    /// Row counts of (`channel_messages`, `channel_deliveries`)
    pub fn stored_rows(&self) -> Result<(u64, u64), ChannelError> {
        let conn = self.lock()?;
        let messages: i64 = conn.query_row("SELECT COUNT(*) FROM channel_messages", [], |row| row.get(0))?;
        let deliveries: i64 = conn.query_row("SELECT COUNT(*) FROM channel_deliveries", [], |row| row.get(0))?;
        Ok((messages.max(0) as u64, deliveries.max(0) as u64))
    }
}

fn trim_acked(conn: &Connection, acked_before: i64) -> Result<usize, ChannelError> {
    let trimmed = conn.execute(
        "DELETE FROM channel_deliveries WHERE state = 'acked' AND available_at <= ?1",
        params![acked_before],
    )?;
    let orphaned = conn.execute(
        "DELETE FROM channel_messages
         WHERE NOT EXISTS (SELECT 1 FROM channel_deliveries d WHERE d.message_id = channel_messages.id)",
        [],
    )?;

    if trimmed > 0 || orphaned > 0 {
        log::debug!("🧹 Trimmed {} acked deliveries, {} messages", trimmed, orphaned);
    }

    Ok(trimmed)
}

#[async_trait]
impl ChannelTransport for SqliteChannel {
    async fn publish(&self, payload: &[u8]) -> Result<MessageId, PublishError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| PublishError::Unavailable("connection mutex poisoned".to_string()))?;
        let now = now_ms();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO channel_messages (topic, payload, published_at) VALUES (?1, ?2, ?3)",
            params![self.settings.topic, payload, now],
        )?;
        let message_id = tx.last_insert_rowid();

        let fanout = tx.execute(
            "INSERT INTO channel_deliveries (subscription, message_id, available_at)
             SELECT name, ?1, ?2 FROM channel_subscriptions WHERE topic = ?3",
            params![message_id, now, self.settings.topic],
        )?;
        if fanout == 0 {
            // no subscription will ever see it; the id stays reserved
            tx.execute("DELETE FROM channel_messages WHERE id = ?1", params![message_id])?;
        }
        tx.commit()?;

        if fanout == 0 {
            log::debug!("📭 Message {} published with no subscriptions on {}", message_id, self.settings.topic);
        }

        Ok(message_id)
    }

    async fn create_subscription(&self, subscription: &str) -> Result<(), ChannelError> {
        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT topic FROM channel_subscriptions WHERE name = ?1",
                params![subscription],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(topic) if topic == self.settings.topic => Ok(()),
            Some(topic) => Err(ChannelError::Unavailable(format!(
                "subscription {} is bound to topic {}, not {}",
                subscription, topic, self.settings.topic
            ))),
            None => {
                conn.execute(
                    "INSERT INTO channel_subscriptions (name, topic, created_at) VALUES (?1, ?2, ?3)",
                    params![subscription, self.settings.topic, now_ms()],
                )?;
                log::info!("📬 Created subscription {} on topic {}", subscription, self.settings.topic);
                Ok(())
            }
        }
    }

    async fn pull(&self, subscription: &str) -> Result<Option<ChannelMessage>, ChannelError> {
        let mut conn = self.lock()?;
        let now = now_ms();
        let tx = conn.transaction()?;

        let known: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM channel_subscriptions WHERE name = ?1 AND topic = ?2",
                params![subscription, self.settings.topic],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(ChannelError::UnknownSubscription(subscription.to_string()));
        }

        let next: Option<(MessageId, u32, Vec<u8>)> = tx
            .query_row(
                "SELECT d.message_id, d.attempts, m.payload
                 FROM channel_deliveries d
                 JOIN channel_messages m ON m.id = d.message_id
                 WHERE d.subscription = ?1 AND d.state != 'acked' AND d.available_at <= ?2
                 ORDER BY d.available_at ASC, d.message_id ASC
                 LIMIT 1",
                params![subscription, now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((message_id, attempts, payload)) = next else {
            return Ok(None);
        };

        let attempt = attempts + 1;
        let delivery_id = format!("{}-{}", message_id, attempt);
        tx.execute(
            "UPDATE channel_deliveries
             SET state = 'unacked', attempts = ?1, delivery_id = ?2, available_at = ?3
             WHERE subscription = ?4 AND message_id = ?5",
            params![
                attempt,
                delivery_id,
                now.saturating_add(duration_ms(self.settings.ack_deadline)),
                subscription,
                message_id
            ],
        )?;
        tx.commit()?;

        if attempt > 1 {
            log::debug!("🔁 Redelivering message {} (attempt {})", message_id, attempt);
        }

        Ok(Some(ChannelMessage {
            delivery_id,
            message_id,
            attempt,
            payload,
        }))
    }

    async fn ack(&self, subscription: &str, delivery_id: &str) -> Result<bool, ChannelError> {
        self.settle(subscription, delivery_id, DeliveryState::Acked, now_ms())
    }

    async fn nack(&self, subscription: &str, delivery_id: &str) -> Result<bool, ChannelError> {
        let available_at = now_ms().saturating_add(duration_ms(self.settings.nack_delay));
        self.settle(subscription, delivery_id, DeliveryState::Nacked, available_at)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
