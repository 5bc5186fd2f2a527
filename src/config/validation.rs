//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry limit > 0, timeouts > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FailoverConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::FailoverConfig;
use crate::endpoint::EndpointList;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("broker.endpoints is empty")]
    NoEndpoints,

    #[error("broker.retry_limit must be at least 1")]
    ZeroRetryLimit,

    #[error("broker.connect_timeout_ms must be greater than 0")]
    ZeroConnectTimeout,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("alerts.webhook_url '{0}' is not an http(s) URL")]
    InvalidWebhookUrl(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let broker = &config.broker;

    if EndpointList::parse(&broker.endpoints).is_err() {
        errors.push(ValidationError::NoEndpoints);
    }
    if broker.retry_limit == 0 {
        errors.push(ValidationError::ZeroRetryLimit);
    }
    if broker.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }

    if let Some(hook) = &config.alerts.webhook_url {
        let ok = Url::parse(hook)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false);
        if !ok {
            errors.push(ValidationError::InvalidWebhookUrl(hook.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
