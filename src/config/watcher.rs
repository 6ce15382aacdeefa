//! Configuration file watcher for hot-reload support
//!
//! Only model endpoints and the transaction timeout are picked up by a running
//! hub. Every reload is compared with the configuration the hub was built
//! from, and anything else that changed is reported as needing a restart.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{AppConfig, ModelConfig, WidgetConfig};

/// A freshly loaded configuration
#[derive(Debug, Clone)]
pub struct ConfigReload {
    pub config: AppConfig,
    /// Changes the running hub ignores until restart
    pub restart_required: Vec<String>,
}

/// Watches the config file and yields validated reloads
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
    running: Arc<AppConfig>,
}

impl ConfigWatcher {
    /// Load `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let (tx, rx) = mpsc::channel(10);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);

        let config_path_clone = config_path.clone();

        // notify callbacks run on their own OS thread, not in the Tokio context
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                debug!("Config file modified: {:?}", event.paths);

                let config_path = config_path_clone.clone();
                let tx = tx.clone();

                runtime_handle.spawn(async move {
                    // Debounce: wait for the writer to finish
                    tokio::time::sleep(Duration::from_millis(100)).await;

                    match AppConfig::load(&config_path).await {
                        Ok(new_config) => {
                            if let Err(e) = tx.send(new_config).await {
                                error!("Failed to send config update: {}", e);
                            }
                        }
                        Err(e) => warn!("Failed to reload config (keeping old config): {:#}", e),
                    }
                });
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                rx,
                running: initial_config.clone(),
            },
            initial_config,
        ))
    }

    /// Configuration the hub was built from
    pub fn running(&self) -> &AppConfig {
        &self.running
    }

    /// Wait for the next valid config update.
    /// Returns None if the watcher has been closed.
    pub async fn next_config(&mut self) -> Option<ConfigReload> {
        let config = self.rx.recv().await?;
        let restart_required = restart_required(&self.running, &config);

        if restart_required.is_empty() {
            info!("Configuration reloaded successfully");
        }
        for change in &restart_required {
            warn!(change = %change, "Configuration change needs a restart to take effect");
        }

        Some(ConfigReload {
            config,
            restart_required,
        })
    }
}

/// Differences between `running` and `next` that cannot be applied live
pub fn restart_required(running: &AppConfig, next: &AppConfig) -> Vec<String> {
    let mut changes = Vec::new();

    if running.remote.base_url != next.remote.base_url {
        changes.push(format!(
            "remote.base_url changed ({} -> {})",
            running.remote.base_url, next.remote.base_url
        ));
    }
    if running.remote.request_timeout_ms != next.remote.request_timeout_ms {
        changes.push("remote.request_timeout_ms changed".to_string());
    }

    let before: HashMap<&str, &ModelConfig> = running.models.iter().map(|m| (m.name.as_str(), m)).collect();
    let after: HashMap<&str, &ModelConfig> = next.models.iter().map(|m| (m.name.as_str(), m)).collect();
    for model in &next.models {
        if !before.contains_key(model.name.as_str()) {
            changes.push(format!("model '{}' added", model.name));
        }
    }
    for model in &running.models {
        if !after.contains_key(model.name.as_str()) {
            changes.push(format!("model '{}' removed", model.name));
        }
    }

    let before: HashMap<&str, &WidgetConfig> = running.widgets.iter().map(|w| (w.name.as_str(), w)).collect();
    let after: HashMap<&str, &WidgetConfig> = next.widgets.iter().map(|w| (w.name.as_str(), w)).collect();
    for widget in &next.widgets {
        match before.get(widget.name.as_str()) {
            None => changes.push(format!("widget '{}' added", widget.name)),
            Some(old) if !same_wiring(old, widget) => {
                changes.push(format!("widget '{}' changed", widget.name))
            }
            Some(_) => {}
        }
    }
    for widget in &running.widgets {
        if !after.contains_key(widget.name.as_str()) {
            changes.push(format!("widget '{}' removed", widget.name));
        }
    }

    changes
}

/// `initial_read` only matters at startup and is not compared
fn same_wiring(a: &WidgetConfig, b: &WidgetConfig) -> bool {
    a.model == b.model && a.params == b.params && a.endpoints == b.endpoints
}
