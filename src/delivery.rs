use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::config::WebhookConfig;

/// Transport for a composed message.
///
/// Failures are reported as `false`, never as errors: a lost notification
/// does not fail the run.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Transport hook. Implementations may assume `text` is not blank;
    /// callers go through [`deliver`].
    async fn send(&self, text: &str) -> bool;
}

/// Deliver `text` through `transport`. Blank text is refused without
/// touching the transport.
pub async fn deliver(transport: &dyn Deliver, text: &str) -> bool {
    if text.trim().is_empty() {
        warn!("refusing to deliver an empty message");
        return false;
    }
    transport.send(text).await
}

/// Fixed-interval retry: `attempts` tries in total, `backoff` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

impl From<&WebhookConfig> for RetryPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            backoff: config.backoff(),
        }
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(rename = "Content")]
    content: &'a str,
}

/// Posts `{"Content": text}` to a chat webhook.
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            retry,
        }
    }
}

#[async_trait]
impl Deliver for WebhookClient {
    /// Anything other than 200, including transport errors, counts as a
    /// failed attempt.
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    async fn send(&self, text: &str) -> bool {
        let payload = Payload { content: text };
        for attempt in 1..=self.retry.attempts {
            match self.http.post(&self.url).json(&payload).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!(attempt, "message sent successfully");
                    return true;
                }
                Ok(response) => {
                    warn!(attempt, status = %response.status(), "webhook request failed");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "webhook request failed");
                }
            }
            if attempt < self.retry.attempts {
                tokio::time::sleep(self.retry.backoff).await;
            }
        }
        error!(attempts = self.retry.attempts, text = %text, "couldn't send message");
        false
    }
}

/// Test mode: prints the message to stdout instead of posting it.
pub struct DryRun;

#[async_trait]
impl Deliver for DryRun {
    async fn send(&self, text: &str) -> bool {
        println!("{text}");
        true
    }
}

/// Pick the transport from the `[webhook]` config.
pub fn from_config(config: &WebhookConfig) -> Box<dyn Deliver> {
    if config.test_mode {
        info!("test mode, printing message instead of posting it");
        Box::new(DryRun)
    } else {
        Box::new(WebhookClient::new(config.url.clone(), RetryPolicy::from(config)))
    }
}
