//! Configuration file watcher for hot reload.
//!
//! Only settings that can change without restarting the daemon are applied
//! by the receiver (currently `supervisor.auto_restart`); everything else
//! takes effect on the next boot.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::DaemonConfig;

/// Bursts of events closer together than this collapse into one reload.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<DaemonConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<DaemonConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called inside a Tokio runtime.
    ///
    /// The parent directory is watched so editors that save by rename are
    /// still seen. The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (touch_tx, touch_rx) = mpsc::unbounded_channel::<()>();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = touch_tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(self.path.clone(), touch_rx, self.update_tx));
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

async fn reload_loop(
    path: PathBuf,
    mut touches: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<DaemonConfig>,
) {
    while touches.recv().await.is_some() {
        // Swallow the rest of the burst.
        loop {
            match tokio::time::timeout(DEBOUNCE, touches.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!(path = %path.display(), "Config file change detected, reloading");
        let loaded = tokio::task::spawn_blocking({
            let path = path.clone();
            move || load_config(&path)
        })
        .await;

        match loaded {
            Ok(Ok(config)) => {
                if updates.send(config).is_err() {
                    return;
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration")
            }
            Err(e) => tracing::error!(error = %e, "Config reload task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_of_changes_yields_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qmr-proxyd.toml");
        std::fs::write(&path, "[supervisor]\nauto_restart = true\n").unwrap();

        let (touch_tx, touch_rx) = mpsc::unbounded_channel();
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        tokio::spawn(reload_loop(path, touch_rx, update_tx));

        for _ in 0..5 {
            touch_tx.send(()).unwrap();
        }

        let config = tokio::time::timeout(Duration::from_secs(2), update_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(config.supervisor.auto_restart);

        let extra = tokio::time::timeout(DEBOUNCE * 3, update_rx.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_invalid_reload_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qmr-proxyd.toml");
        std::fs::write(&path, "[control]\nbind_address = \"nope\"\n").unwrap();

        let (touch_tx, touch_rx) = mpsc::unbounded_channel();
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        tokio::spawn(reload_loop(path, touch_rx, update_tx));
        touch_tx.send(()).unwrap();

        let update = tokio::time::timeout(DEBOUNCE * 4, update_rx.recv()).await;
        assert!(update.is_err());
    }
}
