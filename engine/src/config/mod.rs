//! Configuration management
//!
//! This module handles loading, validation, and management of the Maestro
//! configuration. Configuration is stored in TOML format at
//! ~/.maestro/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Data directory and log level
//! - **server**: HTTP API bind address
//! - **backends**: Serving endpoint and the backend catalog entries
//! - **routing**: Task-analysis thresholds, stage timeout, feedback promotion
//! - **memory**: Semantic memory retrieval settings
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory and creates the data directory if it doesn't exist.

use crate::catalog::{Capability, CostClass};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// This structure represents the complete Maestro configuration loaded from
/// ~/.maestro/config.toml. Every section falls back to its defaults when
/// absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend catalog configuration
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Routing thresholds and feedback promotion knobs
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Semantic memory settings
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the HTTP API
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Backend catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Base URL of the Ollama-compatible serving endpoint shared by all
    /// catalog entries
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// One entry per backend the router may choose
    #[serde(default = "default_backend_entries", rename = "backend")]
    pub entries: Vec<BackendEntry>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            entries: default_backend_entries(),
        }
    }
}

/// One backend catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEntry {
    /// Catalog name (routing and feedback key)
    pub name: String,

    /// Model identifier passed to the serving endpoint
    pub model: String,

    /// Advertised capabilities
    pub capabilities: Vec<Capability>,

    /// Maximum context window in tokens
    pub max_context: u32,

    /// Cost/speed class
    pub cost_class: CostClass,

    /// Baseline routing priority (higher wins ties)
    pub default_priority: u8,

    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Routing thresholds and feedback promotion knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Character count above which a task is considered long
    #[serde(default = "default_long_task_threshold")]
    pub long_task_threshold: usize,

    /// Character count above which a task is considered medium-length
    #[serde(default = "default_medium_task_threshold")]
    pub medium_task_threshold: usize,

    /// Timeout for a single stage invocation, in seconds
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Minimum number of ratings before feedback can promote a backend
    #[serde(default = "default_feedback_min_count")]
    pub feedback_min_count: u64,

    /// Minimum mean rating before feedback can promote a backend
    #[serde(default = "default_feedback_min_mean")]
    pub feedback_min_mean: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            long_task_threshold: default_long_task_threshold(),
            medium_task_threshold: default_medium_task_threshold(),
            stage_timeout_secs: default_stage_timeout_secs(),
            feedback_min_count: default_feedback_min_count(),
            feedback_min_mean: default_feedback_min_mean(),
        }
    }
}

/// Semantic memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of prior entries retrieved as context for a run
    #[serde(default = "default_retrieve_k")]
    pub retrieve_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retrieve_k: default_retrieve_k(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.maestro")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_long_task_threshold() -> usize {
    500
}

fn default_medium_task_threshold() -> usize {
    200
}

fn default_stage_timeout_secs() -> u64 {
    120
}

fn default_feedback_min_count() -> u64 {
    3
}

fn default_feedback_min_mean() -> f64 {
    4.0
}

fn default_retrieve_k() -> usize {
    3
}

/// The stock three-backend catalog: a fast small model, a mid-sized coding
/// model, and a heavyweight multilingual model.
fn default_backend_entries() -> Vec<BackendEntry> {
    vec![
        BackendEntry {
            name: "phi3".to_string(),
            model: "phi3:mini".to_string(),
            capabilities: vec![Capability::General, Capability::Reasoning, Capability::Fast],
            max_context: 2048,
            cost_class: CostClass::Light,
            default_priority: 1,
            temperature: default_temperature(),
        },
        BackendEntry {
            name: "gemma3".to_string(),
            model: "gemma3:latest".to_string(),
            capabilities: vec![
                Capability::General,
                Capability::Coding,
                Capability::Analysis,
            ],
            max_context: 4096,
            cost_class: CostClass::Medium,
            default_priority: 2,
            temperature: default_temperature(),
        },
        BackendEntry {
            name: "qwen3".to_string(),
            model: "qwen3:latest".to_string(),
            capabilities: vec![
                Capability::General,
                Capability::Multilingual,
                Capability::Complex,
            ],
            max_context: 8192,
            cost_class: CostClass::Heavy,
            default_priority: 3,
            temperature: default_temperature(),
        },
    ]
}

impl Config {
    /// Default configuration file location: ~/.maestro/config.toml
    pub fn default_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir().ok_or_else(|| {
            EngineError::Validation("cannot determine home directory".to_string())
        })?;
        Ok(home.join(".maestro").join("config.toml"))
    }

    /// Load configuration from the default location, writing a default
    /// config file there if none exists yet.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let path = Self::default_path()?;

        if !path.exists() {
            let config = Config::default();
            config.save_to_path(&path)?;
            tracing::info!("Created default configuration at {}", path.display());
            return config.expanded();
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            EngineError::Storage(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            EngineError::Validation(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.expanded()
    }

    /// Write this configuration to the given path, creating parent
    /// directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Storage(format!(
                    "failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Storage(format!("failed to serialize config: {}", e)))?;

        fs::write(path, contents).map_err(|e| {
            EngineError::Storage(format!(
                "failed to write config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Expand ~ in paths and validate the result
    fn expanded(mut self) -> Result<Self, EngineError> {
        self.core.data_dir = expand_tilde(&self.core.data_dir)?;
        self.validate()?;
        Ok(self)
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.backends.entries.is_empty() {
            return Err(EngineError::Validation(
                "at least one backend must be configured".to_string(),
            ));
        }

        if self.routing.medium_task_threshold >= self.routing.long_task_threshold {
            return Err(EngineError::Validation(format!(
                "medium_task_threshold ({}) must be below long_task_threshold ({})",
                self.routing.medium_task_threshold, self.routing.long_task_threshold
            )));
        }

        if !(1.0..=5.0).contains(&self.routing.feedback_min_mean) {
            return Err(EngineError::Validation(format!(
                "feedback_min_mean must be within the rating scale [1, 5], got {}",
                self.routing.feedback_min_mean
            )));
        }

        if self.routing.stage_timeout_secs == 0 {
            return Err(EngineError::Validation(
                "stage_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.memory.retrieve_k == 0 {
            return Err(EngineError::Validation(
                "memory.retrieve_k must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the append-only feedback log
    pub fn feedback_log_path(&self) -> PathBuf {
        self.core.data_dir.join("feedback").join("feedback.jsonl")
    }

    /// Path of the semantic memory database
    pub fn memory_db_path(&self) -> PathBuf {
        self.core.data_dir.join("memory.db")
    }
}

/// Expand a leading ~ to the user's home directory
fn expand_tilde(path: &Path) -> Result<PathBuf, EngineError> {
    let raw = path.to_string_lossy();

    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            EngineError::Validation("cannot determine home directory".to_string())
        })?;
        return Ok(home.join(rest));
    }

    if raw == "~" {
        return dirs::home_dir().ok_or_else(|| {
            EngineError::Validation("cannot determine home directory".to_string())
        });
    }

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backends.entries.len(), 3);
        assert_eq!(config.routing.long_task_threshold, 500);
        assert_eq!(config.routing.feedback_min_count, 3);
        assert_eq!(config.memory.retrieve_k, 3);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.backends.entries.len(), 3);
        assert_eq!(config.backends.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [routing]
            stage_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.routing.stage_timeout_secs, 30);
        // Untouched sections keep their defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.routing.long_task_threshold, 500);
    }

    #[test]
    fn test_backend_entries_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [backends]
            base_url = "http://10.0.0.5:11434"

            [[backends.backend]]
            name = "solo"
            model = "solo:latest"
            capabilities = ["general", "complex"]
            max_context = 4096
            cost_class = "medium"
            default_priority = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.backends.entries.len(), 1);
        assert_eq!(config.backends.entries[0].name, "solo");
        assert_eq!(config.backends.entries[0].capabilities.len(), 2);
        assert_eq!(config.backends.entries[0].temperature, 0.7);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.routing.medium_task_threshold = 600;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("medium_task_threshold"));
    }

    #[test]
    fn test_validate_rejects_no_backends() {
        let mut config = Config::default();
        config.backends.entries.clear();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.backends.entries.len(), config.backends.entries.len());
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/data")).unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let absolute = expand_tilde(Path::new("/var/lib/maestro")).unwrap();
        assert_eq!(absolute, PathBuf::from("/var/lib/maestro"));
    }

    #[test]
    fn test_derived_paths() {
        let mut config = Config::default();
        config.core.data_dir = PathBuf::from("/tmp/maestro-test");

        assert_eq!(
            config.feedback_log_path(),
            PathBuf::from("/tmp/maestro-test/feedback/feedback.jsonl")
        );
        assert_eq!(
            config.memory_db_path(),
            PathBuf::from("/tmp/maestro-test/memory.db")
        );
    }
}
