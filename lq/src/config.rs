//! Lookupq configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::lookup::LookupError;
use crate::scheduler::{RateLimitConfig, SchedulerConfig};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Worker pool, timeout and retry settings
    pub scheduler: SchedulerConfig,

    /// API rate ceiling used to stagger the initial queue
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,

    /// Lookup API settings
    pub lookup: LookupConfig,

    /// Where response artifacts go
    pub output: OutputConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_workers == 0 {
            return Err(eyre::eyre!("scheduler.max-workers must be at least 1"));
        }
        if self.rate_limit.calls_per_window <= self.rate_limit.safety_margin {
            return Err(eyre::eyre!(
                "rate-limit.calls-per-window ({}) must be greater than rate-limit.safety-margin ({})",
                self.rate_limit.calls_per_window,
                self.rate_limit.safety_margin
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(eyre::eyre!("rate-limit.window-secs must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .lookupq.yml
        let local_config = PathBuf::from(".lookupq.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/lookupq/lookupq.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lookupq").join("lookupq.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Lookup API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Person endpoint URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// File holding the API key, used when the environment variable is unset
    #[serde(rename = "api-key-file")]
    pub api_key_file: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.fullcontact.com/v2/person.json".to_string(),
            api_key_env: "FULLCONTACT_API_KEY".to_string(),
            api_key_file: "~/.fc_key".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl LookupConfig {
    /// Resolve the API key: environment variable first, then the key file
    pub fn get_api_key(&self) -> Result<String, LookupError> {
        if let Ok(key) = std::env::var(&self.api_key_env)
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }

        let path = expand_home(&self.api_key_file);
        if !path.exists() {
            return Err(LookupError::MissingApiKey {
                env: self.api_key_env.clone(),
                file: self.api_key_file.clone(),
            });
        }
        let key = fs::read_to_string(&path).map_err(|source| LookupError::ApiKeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(key.replace('\n', "").trim().to_string())
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for per-item JSON responses
    #[serde(rename = "out-dir")]
    pub out_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/lookupq/json on Linux)
        let out_dir = dirs::data_dir()
            .map(|d| d.join("lookupq"))
            .unwrap_or_else(|| PathBuf::from(".lookupq"))
            .join("json");
        Self { out_dir }
    }
}

/// Resolve a leading `~/` against the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
