//! Configuration management
//!
//! This module handles loading and validation of the Redline configuration.
//! Configuration is stored in TOML format at ~/.redline/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **memory**: Memory database file and pool size
//! - **orchestrator**: Batch size and instance-level memory labels
//! - **target**: OpenAI-compatible endpoint settings
//!
//! Every section and every key is optional; missing values take their
//! defaults. `~` in paths is expanded to the user's home directory.
//!
//! # Examples
//!
//! ```no_run
//! use redline_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Memory database: {:?}", config.db_path());
//! println!("Batch size: {}", config.orchestrator.batch_size);
//! # Ok(())
//! # }
//! ```

use sdk::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub target: TargetConfig,
}

/// Core settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Memory store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Database file, relative to `core.data_dir` unless absolute
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Requests dispatched concurrently per chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Labels attached to every piece the orchestrator sends
    #[serde(default)]
    pub memory_labels: HashMap<String, String>,
}

/// OpenAI-compatible chat target settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    // Note: the key itself is never written to the config file
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.redline")
}

fn default_db_file() -> PathBuf {
    PathBuf::from("memory.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_batch_size() -> usize {
    10
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            memory_labels: HashMap::new(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from ~/.redline/config.toml, writing the defaults
    /// there first if the file does not exist
    pub fn load_or_create() -> Result<Self, OrchestratorError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, OrchestratorError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("Failed to read config file: {}", e))
        })?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| OrchestratorError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    fn create_default(path: &Path) -> Result<Self, OrchestratorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Written before processing so `~` stays unexpanded on disk
        let toml_string = toml::to_string_pretty(&Self::default()).map_err(|e| {
            OrchestratorError::Config(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, toml_string).map_err(|e| {
            OrchestratorError::Config(format!("Failed to write config file: {}", e))
        })?;

        let mut config = Self::default();
        config.validate_and_process()?;
        Ok(config)
    }

    fn default_config_path() -> Result<PathBuf, OrchestratorError> {
        let home = dirs::home_dir().ok_or_else(|| {
            OrchestratorError::Config("Could not determine home directory".to_string())
        })?;

        Ok(home.join(".redline").join("config.toml"))
    }

    /// Full path of the memory database
    pub fn db_path(&self) -> PathBuf {
        self.core.data_dir.join(&self.memory.db_file)
    }

    fn validate_and_process(&mut self) -> Result<(), OrchestratorError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(OrchestratorError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.orchestrator.batch_size == 0 {
            return Err(OrchestratorError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.memory.max_connections == 0 {
            return Err(OrchestratorError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.target.timeout_secs == 0 {
            return Err(OrchestratorError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                OrchestratorError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, OrchestratorError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| OrchestratorError::Config("Invalid UTF-8 in path".to_string()))?;

    let home = || {
        dirs::home_dir().ok_or_else(|| {
            OrchestratorError::Config("Could not determine home directory".to_string())
        })
    };

    if let Some(rest) = path_str.strip_prefix("~/") {
        Ok(home()?.join(rest))
    } else if path_str == "~" {
        home()
    } else {
        Ok(path.to_path_buf())
    }
}
