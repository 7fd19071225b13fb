//! server-status - HTTP liveness monitor
//!
//! Polls a list of HTTP(S) endpoints on their own schedules and reports the
//! worst status across all of them.

mod config;
mod models;
mod probe;
mod scheduler;
mod sink;
mod status;
mod web;

use config::ServerConfig;
use probe::{HttpTransport, Prober};
use scheduler::MonitorSet;
use sink::LogSink;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("server_status=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting server-status on port {}...", cfg.http_port);
    tracing::info!("Using targets file {}", cfg.targets_path.display());

    let targets = config::load_targets_or_empty(&cfg.targets_path)?;

    // Create monitors
    let transport = Arc::new(HttpTransport::new()?);
    let monitors = Arc::new(MonitorSet::new(Prober::new(transport), Arc::new(LogSink::new())));
    monitors.replace_all(targets);

    spawn_reload_on_hangup(cfg.clone(), monitors.clone());

    // Start web server
    let server = Server::new(cfg, monitors.clone());
    let result = server.start(shutdown_signal()).await;

    tracing::info!("Final status: {}", monitors.aggregate_status());
    monitors.shutdown();
    tracing::info!("server-status stopped");

    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Re-read the targets file whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(cfg: ServerConfig, monitors: Arc<MonitorSet>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("SIGHUP reload unavailable: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading {}", cfg.targets_path.display());
            // Errors are logged by reload_targets; the old set keeps running.
            let _ = web::reload_targets(&cfg.targets_path, &monitors);
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_cfg: ServerConfig, _monitors: Arc<MonitorSet>) {}
