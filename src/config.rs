use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrataConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub flush: FlushConfig,
    pub similarity: SimilarityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the collection log.
    pub dir: String,
    /// Log file name inside `dir`.
    pub log_file: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FlushConfig {
    /// Debounce window for coalescing queued writes into one flush.
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Default number of connections returned by nearest-neighbor queries.
    pub default_limit: usize,
    /// Apply the adaptive deviation cutoff to ranked results.
    pub trim_by_deviation: bool,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            flush: FlushConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_strata_dir()
            .join("data")
            .to_string_lossy()
            .into_owned();
        Self {
            dir,
            log_file: "items.log".into(),
        }
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            trim_by_deviation: true,
        }
    }
}

/// Returns `~/.strata/`
pub fn default_strata_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".strata")
}

/// Returns the default config file path: `~/.strata/config.toml`
pub fn default_config_path() -> PathBuf {
    default_strata_dir().join("config.toml")
}

impl StrataConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            StrataConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (STRATA_DIR, STRATA_LOG_LEVEL,
    /// STRATA_FLUSH_DEBOUNCE_MS).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STRATA_DIR") {
            self.storage.dir = val;
        }
        if let Ok(val) = std::env::var("STRATA_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("STRATA_FLUSH_DEBOUNCE_MS") {
            match val.parse() {
                Ok(ms) => self.flush.debounce_ms = ms,
                Err(_) => tracing::warn!(value = %val, "ignoring bad STRATA_FLUSH_DEBOUNCE_MS"),
            }
        }
    }

    /// Resolve the storage directory, expanding `~` if needed.
    pub fn resolved_storage_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.dir)
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush.debounce_ms)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
