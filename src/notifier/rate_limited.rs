//! Fixed-interval rate limiter in front of a notifier
//!
//! One permit is released per interval, with the first permit available one
//! full interval after construction. Callers queue on the permit source in
//! arrival order and each waits until its own permit is released, so no
//! notification is dropped and bursts are spread out at the configured cadence.
//!
//! Permits do not accumulate while idle (`MissedTickBehavior::Delay`), so two
//! sends are never closer together than one interval.

use super::{NotifyError, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub struct RateLimitedNotifier<N: Notifier + ?Sized = dyn Notifier> {
    inner: Arc<N>,
    permits: Mutex<Interval>,
    interval: Duration,
}

impl<N: Notifier + ?Sized> RateLimitedNotifier<N> {
    /// Must be called inside a tokio runtime
    pub fn new(inner: Arc<N>, interval: Duration) -> Self {
        // tokio intervals panic on a zero period
        let interval = interval.max(Duration::from_millis(1));
        let mut permits = interval_at(Instant::now() + interval, interval);
        permits.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            inner,
            permits: Mutex::new(permits),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next permit, then forward exactly one send
    pub async fn send_throttled(&self, text: &str) -> Result<(), NotifyError> {
        {
            let mut permits = self.permits.lock().await;
            permits.tick().await;
        }
        self.inner.send(text).await
    }
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for RateLimitedNotifier<N> {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.send_throttled(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::testing::RecordingNotifier;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_first_send_waits_one_interval() {
        let start = Instant::now();
        let inner = Arc::new(RecordingNotifier::default());
        let limiter = RateLimitedNotifier::new(inner.clone(), MINUTE);

        limiter.send_throttled("one").await.unwrap();

        assert_eq!(inner.times(), vec![start + MINUTE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sends_are_spread_out() {
        let start = Instant::now();
        let inner = Arc::new(RecordingNotifier::default());
        let limiter = Arc::new(RateLimitedNotifier::new(inner.clone(), MINUTE));

        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.send_throttled(&format!("msg-{}", i)).await
            }));
            // fixes arrival order
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(inner.texts(), vec!["msg-0", "msg-1", "msg-2"]);
        assert_eq!(
            inner.times(),
            vec![start + MINUTE, start + MINUTE * 2, start + MINUTE * 3]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_does_not_bank_permits() {
        let inner = Arc::new(RecordingNotifier::default());
        let limiter = RateLimitedNotifier::new(inner.clone(), MINUTE);

        tokio::time::sleep(MINUTE * 5).await;
        limiter.send_throttled("a").await.unwrap();
        limiter.send_throttled("b").await.unwrap();

        let times = inner.times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_failure_is_returned_and_consumes_permit() {
        let start = Instant::now();
        let inner = Arc::new(RecordingNotifier::failing(500));
        let limiter = RateLimitedNotifier::new(inner.clone(), MINUTE);

        assert!(matches!(limiter.send_throttled("a").await, Err(NotifyError::Status(500))));
        assert!(limiter.send_throttled("b").await.is_err());

        assert_eq!(inner.times(), vec![start + MINUTE, start + MINUTE * 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usable_as_dyn_notifier() {
        let inner: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());
        let limiter: Arc<dyn Notifier> = Arc::new(RateLimitedNotifier::new(inner, Duration::from_secs(1)));

        limiter.send("through the trait").await.unwrap();
    }
}
