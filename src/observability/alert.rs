//! Operator alerting.
//!
//! # Responsibilities
//! - Deliver exhaustion, fault, and permanent-failure notices
//! - Never block or fail the caller
//!
//! # Design Decisions
//! - Log channel is the default and the fallback
//! - Webhook delivery runs on a spawned task with its own timeout

use serde_json::json;
use std::time::Duration;

/// Fire-and-forget alert destination.
pub trait AlertChannel: Send + Sync {
    fn notify(&self, message: &str);
}

/// Emits alerts as error-level log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertChannel;

impl AlertChannel for LogAlertChannel {
    fn notify(&self, message: &str) {
        tracing::error!(target: "broker_failover::alert", alert = %message, "Broker alert");
    }
}

/// POSTs alerts as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookAlertChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertChannel {
    /// Create a webhook channel.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl AlertChannel for WebhookAlertChannel {
    fn notify(&self, message: &str) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                LogAlertChannel.notify(message);
                return;
            }
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let message = message.to_string();
        handle.spawn(async move {
            let body = json!({ "message": message });
            match client.post(&url).json(&body).send().await {
                Ok(res) if res.status().is_success() => {
                    tracing::debug!(url = %url, "Alert delivered");
                }
                Ok(res) => {
                    tracing::warn!(url = %url, status = %res.status(), "Alert webhook rejected alert");
                    LogAlertChannel.notify(&message);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Alert webhook unreachable");
                    LogAlertChannel.notify(&message);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_outside_runtime_falls_back() {
        let channel = WebhookAlertChannel::new("http://127.0.0.1:9/alerts", Duration::from_secs(1)).unwrap();
        channel.notify("no runtime here");
    }
}
