//! Configuration file watching

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::loader::ConfigLoader;
use crate::types::ExtensionConfig;

/// Configuration change event
#[derive(Debug, Clone)]
pub enum ConfigChangeEvent {
    /// The watched file changed on disk
    FileModified { path: PathBuf },
    /// The file was reloaded; `requires_reload` tells whether negotiation is affected
    Reloaded {
        old_config: Arc<ExtensionConfig>,
        new_config: Arc<ExtensionConfig>,
        requires_reload: bool,
    },
    /// The file changed but could not be loaded
    ReloadFailed { path: PathBuf, error: String },
}

/// Watches the configuration file and broadcasts change events
pub struct ConfigWatcher {
    watcher: RecommendedWatcher,
    path: PathBuf,
    event_sender: broadcast::Sender<ConfigChangeEvent>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Result<(Self, broadcast::Receiver<ConfigChangeEvent>)> {
        let path = path.into();
        let (tx, rx) = broadcast::channel(64);

        let tx_clone = tx.clone();
        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        for path in &event.paths {
                            let _ = tx_clone.send(ConfigChangeEvent::FileModified {
                                path: path.clone(),
                            });
                        }
                    }
                }
                Err(e) => {
                    error!("File watching error: {}", e);
                }
            },
            notify::Config::default(),
        )?;

        Ok((
            Self {
                watcher,
                path,
                event_sender: tx,
            },
            rx,
        ))
    }

    /// Start watching; a file that does not exist yet is skipped
    pub fn start(&mut self) -> Result<()> {
        if self.path.exists() {
            self.watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
            debug!(path = ?self.path, "Watching configuration file");
        } else {
            warn!(path = ?self.path, "Configuration file does not exist, not watching");
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.path.exists() {
            self.watcher.unwatch(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload after a modification and broadcast the outcome
    pub fn reload(&self, current: &Arc<ExtensionConfig>) -> ConfigChangeEvent {
        let event = match ConfigLoader::with_path(&self.path).load() {
            Ok(new_config) => {
                let requires_reload = ExtensionConfig::requires_reload(current, &new_config);
                ConfigChangeEvent::Reloaded {
                    old_config: Arc::clone(current),
                    new_config: Arc::new(new_config),
                    requires_reload,
                }
            }
            Err(e) => ConfigChangeEvent::ReloadFailed {
                path: self.path.clone(),
                error: e.to_string(),
            },
        };
        let _ = self.event_sender.send(event.clone());
        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.event_sender.subscribe()
    }
}
