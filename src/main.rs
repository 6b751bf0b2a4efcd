//! abusegate - AbuseIPDB reputation gate.
//!
//! Rejects HTTP requests from IPs whose AbuseIPDB confidence score is above
//! 50, caching scores in SQLite for 24 hours.

mod config;
mod db;
mod error;
mod gate;
mod http;
mod maintenance;
mod metrics;
mod security;
mod telemetry;

use crate::config::{ApiKeyProvider, Config, Settings};
use crate::db::{Database, FRESHNESS_WINDOW_SECS};
use crate::gate::GateState;
use crate::security::{AbuseIpDbClient, BanDecider};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        listen = %config.server.listen,
        database = %config.database.path,
        freshness_secs = FRESHNESS_WINDOW_SECS,
        "Starting abusegate"
    );

    let db = Arc::new(Database::new(&config.database.path).await?);

    let settings = Arc::new(Settings::from_config(&config_path, &config));
    if settings.api_key().is_none() {
        warn!("No AbuseIPDB API key configured - all requests will be allowed");
    }

    let client = Arc::new(AbuseIpDbClient::new(&config.abuseipdb));
    let decider = Arc::new(BanDecider::new(db.clone(), client, settings.clone()));

    let (trigger, shutdown) = http::Shutdown::channel();

    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_task = if config.server.metrics_port == 0 {
        info!("Metrics disabled");
        None
    } else {
        metrics::init();
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => Some(tokio::spawn(http::serve_metrics(listener, shutdown.wait()))),
            Err(e) => {
                error!(%addr, error = %e, "Failed to bind metrics server");
                None
            }
        }
    };

    let purge_every = Duration::from_secs(config.maintenance.purge_interval_secs.max(1));
    maintenance::spawn_purge_task(db.clone(), purge_every);
    info!(interval_secs = purge_every.as_secs(), "Score purge task started");

    spawn_reload_task(Arc::clone(&settings));

    let listener = tokio::net::TcpListener::bind(config.server.listen).await?;
    info!(
        addr = %config.server.listen,
        trusted_proxies = ?config.server.trusted_proxies,
        "Gate listening"
    );

    let state = GateState::new(decider, &config.server.trusted_proxies);
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.fire();
    });

    gate::serve(listener, state, shutdown.wait()).await?;

    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    info!("Gate stopped");
    Ok(())
}

/// Reload the API key from the config file on SIGHUP.
#[cfg(unix)]
fn spawn_reload_task(settings: Arc<Settings>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler; config reload disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            match settings.reload() {
                Ok(enabled) => {
                    info!(path = ?settings.path(), enabled = enabled, "Settings reloaded");
                }
                Err(e) => {
                    warn!(path = ?settings.path(), error = %e, "Settings reload failed; keeping previous API key");
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_task(_settings: Arc<Settings>) {}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
