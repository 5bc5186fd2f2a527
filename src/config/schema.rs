//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::endpoint::EndpointList;
use crate::failover::{Credentials, FailoverError};
use crate::resilience::RetryPolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FailoverConfig {
    /// Broker endpoints, credentials, and retry settings.
    pub broker: BrokerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Alert delivery settings.
    pub alerts: AlertConfig,
}

/// Broker connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Comma-separated endpoint addresses, in failover order.
    pub endpoints: String,

    /// Virtual host (message VPN) to join.
    pub virtual_host: String,

    /// Default username.
    pub username: String,

    /// Default password. Prefer the `BROKER_PASSWORD` environment variable.
    pub password: String,

    /// Connection attempts per endpoint before moving on.
    pub retry_limit: u32,

    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Maximum random extra delay in milliseconds (0 = constant delay).
    pub retry_jitter_ms: u64,

    /// Per-attempt connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoints: String::new(),
            virtual_host: "default".to_string(),
            username: "default".to_string(),
            password: String::new(),
            retry_limit: 5,
            retry_delay_ms: 5000,
            retry_jitter_ms: 0,
            connect_timeout_ms: 10_000,
        }
    }
}

impl BrokerConfig {
    /// Parse the endpoint list.
    pub fn endpoint_list(&self) -> Result<EndpointList, FailoverError> {
        EndpointList::parse(&self.endpoints)
    }

    /// Default credentials for the manager.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, &self.virtual_host)
    }

    /// Retry policy applied per endpoint.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_limit, Duration::from_millis(self.retry_delay_ms))
            .with_jitter(Duration::from_millis(self.retry_jitter_ms))
    }

    /// Per-attempt connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("endpoints", &self.endpoints)
            .field("virtual_host", &self.virtual_host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("retry_limit", &self.retry_limit)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("retry_jitter_ms", &self.retry_jitter_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Alert delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Webhook receiving JSON alerts. Alerts are logged when unset.
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds.
    pub webhook_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FailoverConfig::default();
        assert_eq!(config.broker.retry_limit, 5);
        assert_eq!(config.broker.retry_delay_ms, 5000);
        assert_eq!(config.broker.retry_policy().delay(), Duration::from_secs(5));
        assert!(config.alerts.webhook_url.is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut broker = BrokerConfig::default();
        broker.password = "hunter2".to_string();
        let rendered = format!("{:?}", broker);
        assert!(!rendered.contains("hunter2"));
    }
}
