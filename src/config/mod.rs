//! Configuration management for Widget MVC
//!
//! Handles loading, parsing, validation and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::fs;

pub use watcher::{restart_required, ConfigReload, ConfigWatcher};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    /// How long a write may stay unanswered before it is failed locally
    #[serde(default = "default_transaction_timeout")]
    pub transaction_timeout_ms: u64,
    pub models: Vec<ModelConfig>,
    pub widgets: Vec<WidgetConfig>,
}

/// Remote service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// One remote resource shared by any number of widgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub name: String,
    pub endpoint: String,
}

/// Widget definition: its state schema and the model it writes to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WidgetConfig {
    pub name: String,
    pub model: String,
    pub params: Vec<String>,
    /// Per-parameter endpoint overrides
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub endpoints: HashMap<String, String>,
    /// Read every parameter from the model at startup
    #[serde(default = "default_true")]
    pub initial_read: bool,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.request_timeout_ms)
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let base_url = &self.remote.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("remote.base_url must start with http:// or https:// (got '{}')", base_url);
        }
        if self.remote.request_timeout_ms == 0 {
            anyhow::bail!("remote.request_timeout_ms must be greater than 0");
        }
        if self.transaction_timeout_ms == 0 {
            anyhow::bail!("transaction_timeout_ms must be greater than 0");
        }

        if self.models.is_empty() {
            anyhow::bail!("At least one model must be defined");
        }

        let mut model_names = HashSet::new();
        for (idx, model) in self.models.iter().enumerate() {
            if model.name.is_empty() {
                anyhow::bail!("Model {} name cannot be empty", idx);
            }
            if !model_names.insert(model.name.as_str()) {
                anyhow::bail!("Duplicate model name '{}'", model.name);
            }
            validate_endpoint(&model.endpoint)
                .with_context(|| format!("Invalid endpoint for model '{}'", model.name))?;
        }

        let mut widget_names = HashSet::new();
        for (idx, widget) in self.widgets.iter().enumerate() {
            if widget.name.is_empty() {
                anyhow::bail!("Widget {} name cannot be empty", idx);
            }
            if !widget_names.insert(widget.name.as_str()) {
                anyhow::bail!("Duplicate widget name '{}'", widget.name);
            }
            self.validate_widget(widget, &model_names)
                .with_context(|| format!("Invalid widget '{}'", widget.name))?;
        }

        Ok(())
    }

    fn validate_widget(&self, widget: &WidgetConfig, model_names: &HashSet<&str>) -> Result<()> {
        if !model_names.contains(widget.model.as_str()) {
            anyhow::bail!("Unknown model '{}'", widget.model);
        }

        if widget.params.is_empty() {
            anyhow::bail!("At least one state parameter must be listed");
        }

        let mut seen = HashSet::new();
        for param in &widget.params {
            if param.is_empty() {
                anyhow::bail!("Parameter names cannot be empty");
            }
            if !seen.insert(param.as_str()) {
                anyhow::bail!("Duplicate parameter '{}'", param);
            }
        }

        for (param, endpoint) in &widget.endpoints {
            if !seen.contains(param.as_str()) {
                anyhow::bail!("Endpoint override for '{}', which is not a listed parameter", param);
            }
            validate_endpoint(endpoint)
                .with_context(|| format!("Invalid endpoint override for '{}'", param))?;
        }

        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    if endpoint.is_empty() {
        anyhow::bail!("Endpoint cannot be empty");
    }
    if !(endpoint.starts_with('/') || endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        anyhow::bail!("Endpoint '{}' must be a path starting with '/' or an absolute URL", endpoint);
    }
    Ok(())
}

// Default value functions
fn default_base_url() -> String { "http://localhost:8124".to_string() }
fn default_request_timeout() -> u64 { 5000 }
fn default_transaction_timeout() -> u64 { 10000 }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
remote:
  base_url: "http://localhost:9000"
models:
  - name: mixer
    endpoint: /api/mixer
widgets:
  - name: left
    model: mixer
    params: [volume, mute]
    endpoints:
      mute: /api/mixer/mute
  - name: right
    model: mixer
    params: [volume]
    initial_read: false
"#;

    fn sample() -> AppConfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_with_defaults() {
        let config = sample();
        config.validate().unwrap();

        assert_eq!(config.remote.request_timeout_ms, 5000);
        assert_eq!(config.transaction_timeout(), Duration::from_secs(10));
        assert!(config.widgets[0].initial_read);
        assert!(!config.widgets[1].initial_read);
        assert_eq!(config.widgets[0].endpoints.get("mute").map(String::as_str), Some("/api/mixer/mute"));
        assert_eq!(config.model("mixer").map(|m| m.endpoint.as_str()), Some("/api/mixer"));
    }

    #[test]
    fn test_unknown_model_rejected() {
        let mut config = sample();
        config.widgets[0].model = "lights".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("Unknown model 'lights'"));
    }

    #[test]
    fn test_duplicate_params_rejected() {
        let mut config = sample();
        config.widgets[1].params = vec!["volume".to_string(), "volume".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_override_must_name_a_param() {
        let mut config = sample();
        config.widgets[1]
            .endpoints
            .insert("pan".to_string(), "/api/pan".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut config = sample();
        config.remote.base_url = "localhost:9000".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        sample().save(&path).await?;
        let loaded = AppConfig::load(&path).await?;

        assert_eq!(loaded.widgets.len(), 2);
        assert_eq!(loaded.remote.base_url, "http://localhost:9000");
        Ok(())
    }
}
