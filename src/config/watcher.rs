//! Configuration directory watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_profiled;
use crate::config::profile::ActiveProfiles;
use crate::config::schema::GatekeeperConfig;

/// A watcher that monitors the configuration directory for changes.
pub struct ConfigWatcher {
    dir: PathBuf,
    profiles: ActiveProfiles,
    update_tx: mpsc::UnboundedSender<GatekeeperConfig>,
}

fn touches_config(event: &Event) -> bool {
    event
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(dir: &Path, profiles: ActiveProfiles) -> (Self, mpsc::UnboundedReceiver<GatekeeperConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                dir: dir.to_path_buf(),
                profiles,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the directory in a background thread.
    ///
    /// The returned handle must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let dir = self.dir.clone();
        let profiles = self.profiles.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if (event.kind.is_modify() || event.kind.is_create()) && touches_config(&event) {
                        tracing::info!("Config change detected, reloading...");
                        match load_profiled(&dir, &profiles) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = ?self.dir, profiles = %self.profiles, "Config watcher started");
        Ok(watcher)
    }
}
