use std::time::Duration;
use tokio::time::sleep;

/// Retry pacing for transport errors inside long-running loops
///
/// Never gives up: the delay doubles per consecutive failure up to `max_delay_ms`
/// and drops back to `initial_delay_ms` after `reset()`.
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_delay_ms: initial_ms.max(1),
            max_delay_ms: max_ms.max(initial_ms.max(1)),
            current_attempt: 0,
        }
    }

    /// Delay the next `sleep()` will wait
    pub fn next_delay(&self) -> Duration {
        let factor = 2_u64.saturating_pow(self.current_attempt);
        let delay = std::cmp::min(
            self.initial_delay_ms.saturating_mul(factor),
            self.max_delay_ms,
        );
        Duration::from_millis(delay)
    }

    pub async fn sleep(&mut self) {
        let delay = self.next_delay();

        log::warn!(
            "⏳ Retry attempt {} in {}ms",
            self.current_attempt + 1,
            delay.as_millis()
        );

        sleep(delay).await;
        self.current_attempt = self.current_attempt.saturating_add(1);
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delay_doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(100, 500);

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        backoff.sleep().await;
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        backoff.sleep().await;
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        backoff.sleep().await;
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.attempts(), 3);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_no_overflow_after_many_failures() {
        let mut backoff = ExponentialBackoff::new(1_000, 30_000);
        backoff.current_attempt = 200;
        assert_eq!(backoff.next_delay(), Duration::from_millis(30_000));
    }
}
