//! Outbound chat notifications
//!
//! - `WebhookNotifier` - HTTP POST of `{"text": ...}` to a fixed endpoint
//! - `RateLimitedNotifier` - at most one send per fixed interval, callers block
//!   until their permit
//! - `QueuedNotifier` - bounded queue in front of the rate limiter, callers
//!   never block
//!
//! Notification is best-effort everywhere: failures are reported to the caller
//! as `NotifyError` and never retried.

pub mod queued;
pub mod rate_limited;
pub mod webhook;

use async_trait::async_trait;

pub use queued::QueuedNotifier;
pub use rate_limited::RateLimitedNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug)]
pub enum NotifyError {
    Http(reqwest::Error),
    Status(u16),
    QueueFull,
    QueueClosed,
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err)
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Http(e) => write!(f, "HTTP POST request failed: {}", e),
            NotifyError::Status(code) => write!(f, "HTTP POST request failed with status code: {}", code),
            NotifyError::QueueFull => write!(f, "Notification queue full"),
            NotifyError::QueueClosed => write!(f, "Notification queue closed"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Chat-message delivery endpoint
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}
