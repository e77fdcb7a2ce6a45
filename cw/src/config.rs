//! Crewd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main crewd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Watchdog timing configuration
    pub watchdog: WatchdogConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(eyre::eyre!("llm.model must not be empty"));
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(eyre::eyre!(
                "llm.base-url must be an http(s) URL, got: {}",
                self.llm.base_url
            ));
        }
        if self.watchdog.poll_interval_ms == 0 {
            return Err(eyre::eyre!("watchdog.poll-interval-ms must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .crewd.yml
        let local_config = PathBuf::from(".crewd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/crewd/crewd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("crewd").join("crewd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "ollama" supported)
    pub provider: String,

    /// Default model identifier for new agents
    pub model: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Sampling temperature for agent completions
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3.2:latest".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            timeout_ms: 300_000,
        }
    }
}

/// Watchdog timing configuration
///
/// All values in milliseconds so tests can run with short windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Poll interval of the per-task monitor loop
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Silence after which a task earns a stall strike
    #[serde(rename = "stall-threshold-ms")]
    pub stall_threshold_ms: u64,

    /// Overall wall-clock budget for one task execution
    #[serde(rename = "task-timeout-ms")]
    pub task_timeout_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            stall_threshold_ms: 120_000,
            task_timeout_ms: 1_800_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for entity collection files
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/crewd on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("crewd"))
            .unwrap_or_else(|| PathBuf::from(".crewd"));

        Self { data_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.watchdog.poll_interval_ms, 10_000);
        assert_eq!(config.watchdog.stall_threshold_ms, 120_000);
        assert_eq!(config.watchdog.task_timeout_ms, 1_800_000);
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.llm.base_url = "localhost:11434".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.watchdog.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: ollama
  model: phi4:latest
  base-url: http://ollama.lan:11434
  temperature: 0.3
  timeout-ms: 60000

watchdog:
  poll-interval-ms: 5000
  stall-threshold-ms: 60000
  task-timeout-ms: 600000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "phi4:latest");
        assert_eq!(config.llm.base_url, "http://ollama.lan:11434");
        assert_eq!(config.watchdog.poll_interval_ms, 5000);
        assert_eq!(config.watchdog.task_timeout_ms, 600_000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gemma3:4b
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.llm.model, "gemma3:4b");

        // Defaults for unspecified
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.watchdog.stall_threshold_ms, 120_000);
    }
}
