//! Incoming-webhook chat notifier (Slack-compatible payload)
//!
//! Endpoint: configured `NOTIFY_WEBHOOK_URL`
//! Request: `POST {"text": "<message>"}` as JSON
//! Success: HTTP 200 only; every other status is a `NotifyError::Status`

use super::{NotifyError, Notifier};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WebhookPayload { text })
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(NotifyError::Status(response.status().as_u16()));
        }

        log::debug!("✅ Message sent successfully to chat channel");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// One-shot HTTP responder; yields the raw request it received
    async fn spawn_responder(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
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
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            if name.eq_ignore_ascii_case("content-length") {
                                value.trim().parse::<usize>().ok()
                            } else {
                                None
                            }
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status_line
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&request).to_string()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_posts_text_payload() {
        let (url, server) = spawn_responder("200 OK").await;
        let notifier = WebhookNotifier::new(url).unwrap();

        notifier.send("Longest description: x").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"text":"Longest description: x"}"#));
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        for status in ["201 Created", "404 Not Found", "500 Internal Server Error"] {
            let (url, server) = spawn_responder(status).await;
            let notifier = WebhookNotifier::new(url).unwrap();

            let result = notifier.send("hello").await;
            let expected: u16 = status[..3].parse().unwrap();
            assert!(matches!(result, Err(NotifyError::Status(code)) if code == expected));
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = WebhookNotifier::new(format!("http://{}/hook", addr)).unwrap();
        assert!(matches!(notifier.send("hello").await, Err(NotifyError::Http(_))));
    }
}
