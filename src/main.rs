//! Broker failover connection manager.
//!
//! # Architecture Overview
//!
//! ```text
//!   config (TOML) ──▶ FailoverManager ──▶ Transport ──▶ broker endpoint A
//!                        │    ▲                   └───▶ broker endpoint B
//!                        │    │ ResetHook (CacheEpoch)
//!                        ▼    │
//!                    SessionCache         FaultWatchdog ──▶ RecoveryWorker
//! ```
//!
//! Subcommands:
//! - `check`: validate the configuration and exit
//! - `probe`: acquire one session, report the active endpoint, exit
//! - `run`:   hold a cached session, recover and fail over until signalled

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use broker_failover::cache::{CacheEpoch, SessionCache};
use broker_failover::config::{load_config, FailoverConfig};
use broker_failover::failover::FailoverManagerBuilder;
use broker_failover::lifecycle::signals::wait_for_signal;
use broker_failover::observability::logging::init_logging;
use broker_failover::observability::metrics::init_metrics;
use broker_failover::observability::{
    AlertChannel, LogAlertChannel, PrometheusMetrics, WebhookAlertChannel,
};
use broker_failover::transport::TcpTransport;
use broker_failover::{FailoverManager, Session};

/// How often `run` checks that the held session is still connected.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "broker-failover")]
#[command(about = "Failover connection manager for equivalent broker endpoints", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "failover.toml")]
    config: PathBuf,

    /// Override observability.log_level.
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration
    Check,
    /// Acquire one session and report the active endpoint
    Probe,
    /// Hold a session and keep it current until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    init_logging(&level);

    tracing::info!(
        config = %cli.config.display(),
        endpoints = %config.broker.endpoints,
        retry_limit = config.broker.retry_limit,
        retry_delay_ms = config.broker.retry_delay_ms,
        "Configuration loaded"
    );

    if let Commands::Check = cli.command {
        let endpoints = config.broker.endpoint_list()?;
        println!("configuration OK: {} endpoint(s) {}", endpoints.len(), endpoints);
        return Ok(());
    }

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let epoch = CacheEpoch::new();
    let manager = Arc::new(build_manager(&config, epoch.clone())?);

    let result = match cli.command {
        Commands::Probe => probe(&manager).await,
        Commands::Run => run(manager.clone(), epoch).await,
        Commands::Check => Ok(()),
    };

    manager.shutdown().await;
    tracing::info!("Shutdown complete");
    result
}

fn build_manager(
    config: &FailoverConfig,
    epoch: CacheEpoch,
) -> Result<FailoverManager<TcpTransport>, Box<dyn std::error::Error>> {
    let alerts: Arc<dyn AlertChannel> = match &config.alerts.webhook_url {
        Some(url) => Arc::new(WebhookAlertChannel::new(
            url.as_str(),
            Duration::from_secs(config.alerts.webhook_timeout_secs),
        )?),
        None => Arc::new(LogAlertChannel),
    };

    let transport = TcpTransport::new(config.broker.connect_timeout());
    let manager = FailoverManagerBuilder::from_config(&config.broker, transport)?
        .metrics(Arc::new(PrometheusMetrics::new()))
        .alerts(alerts)
        .reset_hook(Arc::new(epoch))
        .build();
    Ok(manager)
}

async fn probe(manager: &FailoverManager<TcpTransport>) -> Result<(), Box<dyn std::error::Error>> {
    let session = manager.acquire(None).await?;
    let active = manager
        .active_endpoint()
        .map(|ep| ep.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("connected: endpoint={} peer={:?}", active, session.peer_addr());
    session.close().await?;
    Ok(())
}

async fn run(
    manager: Arc<FailoverManager<TcpTransport>>,
    epoch: CacheEpoch,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache = SessionCache::new(manager, epoch.clone());
    let mut seen = epoch.current();
    let mut held = cache.get().await?;
    tracing::info!(endpoint = %held.endpoint(), "Holding broker session");

    let shutdown = wait_for_signal();
    tokio::pin!(shutdown);
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = epoch.changed_since(seen) => {}
            _ = liveness.tick() => {
                if held.is_live() {
                    continue;
                }
            }
        }

        seen = epoch.current();
        match cache.get().await {
            Ok(session) => {
                tracing::info!(endpoint = %session.endpoint(), "Broker session replaced");
                held = session;
            }
            Err(e) => tracing::error!(error = %e, "Could not replace broker session"),
        }
    }

    drop(held);
    cache.invalidate().await;
    Ok(())
}
