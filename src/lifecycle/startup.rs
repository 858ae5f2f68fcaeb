//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics and the supervisor from a validated config
//! - Bind the control listener and watch the config file
//! - Optionally start the core with the first source
//! - On shutdown, stop the core before returning
//!
//! # Design Decisions
//! - Fail fast: bind and construction errors are fatal
//! - Autostart failures are logged, not fatal; the API stays up to retry

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::watcher::ConfigWatcher;
use crate::config::DaemonConfig;
use crate::control::ControlServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::relay::EventRelay;
use crate::sources::SourceSelector;
use crate::supervisor::Supervisor;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build supervisor: {0}")]
    Supervisor(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to bind control API on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("control server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the daemon until a termination signal arrives.
pub async fn run(config_path: Option<PathBuf>, config: DaemonConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let relay = EventRelay::new(config.control.event_buffer);
    let supervisor = Supervisor::from_config(&config, relay).map_err(StartupError::Supervisor)?;

    let listener = TcpListener::bind(&config.control.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.control.bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    // Dropping the watcher stops notifications, so it lives until return.
    let _watcher = config_path
        .as_deref()
        .and_then(|path| spawn_config_watcher(path, supervisor.clone()));

    if config.core.autostart {
        let autostart = supervisor.clone();
        tokio::spawn(async move {
            tracing::info!("Autostarting core with the first source");
            if let Err(e) = autostart.start(SourceSelector::First).await {
                tracing::error!(code = e.code(), error = %e, "Autostart failed");
            }
        });
    }

    let server = ControlServer::new(supervisor.clone(), &config.control);
    let served = server.run(listener, shutdown.wait()).await;

    supervisor.shutdown().await;
    tracing::info!("Shutdown complete");
    served.map_err(StartupError::Serve)
}

fn spawn_config_watcher(path: &Path, supervisor: Supervisor) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Config hot reload unavailable");
            return None;
        }
    };

    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            supervisor.set_auto_restart(config.supervisor.auto_restart);
            tracing::info!(
                auto_restart = config.supervisor.auto_restart,
                "Config reloaded; other changes apply on next boot"
            );
        }
    });

    Some(watcher)
}
