//! End-to-end pipeline tests
//!
//! Producer → SQLite channel → subscribe(RecordHandler) → record store →
//! aggregation job → webhook, all against temporary databases.

#[cfg(test)]
mod pipeline_integration_tests {
    use async_trait::async_trait;
    use billflow::channel::{
        subscribe, ChannelSettings, ChannelTransport, DeliveryState, SqliteChannel, SubscriptionSettings,
    };
    use billflow::config::JobSource;
    use billflow::consumer::{NotifyPath, RecordHandler};
    use billflow::notifier::{Notifier, NotifyError, RateLimitedNotifier, WebhookNotifier};
    use billflow::producer::{Producer, TickOutcome};
    use billflow::record::Record;
    use billflow::scheduler::{AggregationJob, JobOutcome};
    use billflow::shutdown::{self, ShutdownSender};
    use billflow::store::{RecordStore, SqliteRecordStore};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SUBSCRIPTION: &str = "Shark-sub";

    /// Collects texts and fires shutdown once `stop_after` have arrived
    struct CollectingNotifier {
        texts: Mutex<Vec<String>>,
        stop_after: usize,
        shutdown_tx: ShutdownSender,
    }

    #[async_trait]
    impl Notifier for CollectingNotifier {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            let mut texts = self.texts.lock().unwrap();
            texts.push(text.to_string());
            if texts.len() >= self.stop_after {
                let _ = self.shutdown_tx.send(true);
            }
            Ok(())
        }
    }

    fn open_channel(path: &Path, nack_delay: Duration) -> Arc<SqliteChannel> {
        Arc::new(
            SqliteChannel::new(
                path,
                ChannelSettings {
                    topic: "Shark".to_string(),
                    ack_deadline: Duration::from_secs(60),
                    nack_delay,
                    ..ChannelSettings::default()
                },
            )
            .unwrap(),
        )
    }

    fn fast_subscription() -> SubscriptionSettings {
        SubscriptionSettings {
            poll_interval: Duration::from_millis(5),
            backoff_initial_ms: 5,
            backoff_max_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_produced_records_are_consumed_persisted_and_summarized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("billflow.db");
        let channel = open_channel(&db_path, Duration::ZERO);
        let store = Arc::new(SqliteRecordStore::new(&db_path).unwrap());
        channel.create_subscription(SUBSCRIPTION).await.unwrap();

        // 1. Produce three records
        let producer = Producer::new(
            channel.clone(),
            vec!["AmazonEC2".to_string(), "Azure".to_string(), "Heroku".to_string()],
            1000.0,
        )
        .unwrap();
        for _ in 0..3 {
            assert!(matches!(producer.tick().await, TickOutcome::Published(_)));
        }
        assert_eq!(channel.backlog(SUBSCRIPTION).unwrap(), 3);

        // 2. Consume them through the rate-limited notifier
        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let collector = Arc::new(CollectingNotifier {
            texts: Mutex::new(Vec::new()),
            stop_after: 3,
            shutdown_tx,
        });
        let collector_dyn: Arc<dyn Notifier> = collector.clone();
        let limiter = Arc::new(RateLimitedNotifier::new(collector_dyn, Duration::from_millis(10)));
        let handler = RecordHandler::new(Some(store.clone()), NotifyPath::Blocking(limiter));

        let stats = tokio::time::timeout(
            Duration::from_secs(10),
            subscribe(channel.as_ref(), SUBSCRIPTION, &handler, &fast_subscription(), shutdown_rx),
        )
        .await
        .expect("consumer should stop after three notifications")
        .unwrap();

        assert_eq!(stats.acked, 3);
        assert_eq!(stats.nacked, 0);
        assert_eq!(channel.backlog(SUBSCRIPTION).unwrap(), 0);

        let texts = collector.texts.lock().unwrap().clone();
        assert_eq!(texts.len(), 3);
        assert!(texts.iter().all(|t| t.starts_with("Message ID: ")));

        // 3. Aggregate what was persisted
        let records = store.fetch_all().await.unwrap();
        assert_eq!(records.len(), 3);

        let (unused_tx, _) = shutdown::channel();
        let summary_sink = Arc::new(CollectingNotifier {
            texts: Mutex::new(Vec::new()),
            stop_after: usize::MAX,
            shutdown_tx: unused_tx,
        });
        let mut job = AggregationJob::new(store.clone(), summary_sink.clone(), JobSource::Records);

        match job.run_once().await.unwrap() {
            JobOutcome::Notified(summary) => {
                assert_eq!(summary.record_count, 3);
                // every description starts with the same five words; "This" reaches each count first
                assert_eq!(summary.mode_word, "This");
            }
            other => panic!("expected a summary, got {:?}", other),
        }
        assert_eq!(summary_sink.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_nacked_not_dropped() {
        let dir = tempdir().unwrap();
        let channel = open_channel(&dir.path().join("channel.db"), Duration::from_secs(3600));
        channel.create_subscription(SUBSCRIPTION).await.unwrap();

        let garbage = channel.publish(b"not a record").await.unwrap();
        let valid_record = Record::new("2024-02-01", "Azure", "blob storage", 4.2).unwrap();
        let valid = channel.publish(&valid_record.encode().unwrap()).await.unwrap();

        let (shutdown_tx, shutdown_rx) = shutdown::channel();
        let collector = Arc::new(CollectingNotifier {
            texts: Mutex::new(Vec::new()),
            stop_after: 1,
            shutdown_tx,
        });
        let collector_dyn: Arc<dyn Notifier> = collector.clone();
        let limiter = Arc::new(RateLimitedNotifier::new(collector_dyn, Duration::from_millis(10)));
        let handler = RecordHandler::new(None, NotifyPath::Blocking(limiter));

        let stats = tokio::time::timeout(
            Duration::from_secs(10),
            subscribe(channel.as_ref(), SUBSCRIPTION, &handler, &fast_subscription(), shutdown_rx),
        )
        .await
        .expect("consumer should stop after one notification")
        .unwrap();

        assert_eq!(stats.acked, 1);
        assert_eq!(stats.nacked, 1);
        assert_eq!(channel.delivery_state(SUBSCRIPTION, garbage).unwrap(), Some(DeliveryState::Nacked));
        assert_eq!(channel.delivery_state(SUBSCRIPTION, valid).unwrap(), Some(DeliveryState::Acked));
        // still pending redelivery
        assert_eq!(channel.backlog(SUBSCRIPTION).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summary_is_posted_to_webhook() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteRecordStore::new(dir.path().join("records.db")).unwrap());
        for description in ["x y", "x", "y y z"] {
            let record = Record::new("2024-02-01", "Heroku", description, 1.0).unwrap();
            store.insert(&record).await.unwrap();
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/services/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await
                .unwrap();

            let text = String::from_utf8_lossy(&request).to_string();
            let body_start = text.find("\r\n\r\n").unwrap() + 4;
            text[body_start..].to_string()
        });

        let notifier = Arc::new(WebhookNotifier::new(endpoint).unwrap());
        let mut job = AggregationJob::new(store, notifier, JobSource::Descriptions);
        assert!(matches!(job.run_once().await.unwrap(), JobOutcome::Notified(_)));

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(
            body["text"],
            "Longest description: y y z\nMost occurring word: y\nLeast occurring word(s): z\nNumber of messages processed: 3"
        );
    }
}
