//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! FailoverManager / FaultWatchdog / RecoveryWorker produce:
//!     → logging.rs (structured log events, run-id spans)
//!     → metrics.rs (endpoint up/down gauge, failure counter)
//!     → alert.rs (exhaustion and permanent-failure notices)
//! ```
//!
//! # Design Decisions
//! - Metrics and alerts are traits so the core stays backend-agnostic
//! - Defaults: Prometheus via the `metrics` facade, alerts via logs

pub mod alert;
pub mod logging;
pub mod metrics;

pub use self::alert::{AlertChannel, LogAlertChannel, WebhookAlertChannel};
pub use self::metrics::{MetricsSink, NoopMetrics, PrometheusMetrics};
