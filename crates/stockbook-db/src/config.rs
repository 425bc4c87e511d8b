//! # Engine Configuration
//!
//! Configuration for the database and numbering.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_DB_PATH=/var/lib/stockbook/stockbook.db                  │
//! │     STOCKBOOK_PURCHASE_PREFIX=PO-                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockbook/stockbook.toml (Linux)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # stockbook.toml
//! [database]
//! path = "./stockbook.db"
//! max_connections = 5
//!
//! [numbering]
//! purchase_prefix = "PUR-"
//! purchase_width = 4
//!
//! [logging]
//! filter = "info,stockbook=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::pool::DbConfig;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,stockbook=debug,sqlx=warn";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created if missing.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Pool acquire timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long a writer waits on a locked database (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./stockbook.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            busy_timeout_ms: default_busy_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Numbering Settings
// =============================================================================

/// How human-facing purchase numbers are formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    #[serde(default = "default_purchase_prefix")]
    pub purchase_prefix: String,

    /// Zero-pad width for the sequence part.
    #[serde(default = "default_purchase_width")]
    pub purchase_width: usize,
}

fn default_purchase_prefix() -> String {
    "PUR-".to_string()
}

fn default_purchase_width() -> usize {
    4
}

impl Default for NumberingConfig {
    fn default() -> Self {
        NumberingConfig {
            purchase_prefix: default_purchase_prefix(),
            purchase_width: default_purchase_width(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub numbering: NumberingConfig,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from TOML file (if exists)
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.numbering.purchase_width == 0 || self.numbering.purchase_width > 12 {
            return Err(ConfigError::Invalid(
                "numbering.purchase_width must be between 1 and 12".into(),
            ));
        }

        Ok(())
    }

    /// Applies `STOCKBOOK_*` environment overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("STOCKBOOK_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid STOCKBOOK_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(prefix) = std::env::var("STOCKBOOK_PURCHASE_PREFIX") {
            self.numbering.purchase_prefix = prefix;
        }

        if let Ok(width) = std::env::var("STOCKBOOK_PURCHASE_WIDTH") {
            if let Ok(w) = width.parse::<usize>() {
                self.numbering.purchase_width = w;
            }
        }

        if let Ok(filter) = std::env::var("STOCKBOOK_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockbook", "stockbook")
            .map(|dirs| dirs.config_dir().join("stockbook.toml"))
    }

    /// Pool settings derived from the `[database]` section.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .run_migrations(self.database.run_migrations)
            .numbering(self.numbering.clone())
    }
}

// =============================================================================
// Tracing
// =============================================================================

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.numbering.purchase_prefix, "PUR-");
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_validation_rules() {
        let mut config = EngineConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.database.min_connections = 10;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.numbering.purchase_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [numbering]
            purchase_prefix = "PO/"
            "#,
        )
        .unwrap();

        assert_eq!(config.numbering.purchase_prefix, "PO/");
        assert_eq!(config.numbering.purchase_width, 4);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockbook.toml");
        std::fs::write(
            &path,
            r#"
            [database]
            path = "shop.db"

            [numbering]
            purchase_width = 6
            "#,
        )
        .unwrap();

        let loaded = EngineConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.numbering.purchase_width, 6);
        assert!(loaded.database.path.ends_with("shop.db"));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockbook.toml");
        std::fs::write(&path, "[numbering]\npurchase_width = \"wide\"\n").unwrap();

        assert!(matches!(
            EngineConfig::load(Some(path.clone())),
            Err(ConfigError::Parse(_))
        ));
        let config = EngineConfig::load_or_default(Some(path));
        assert_eq!(config.numbering.purchase_width, 4);
    }

    #[test]
    fn test_db_config_carries_numbering() {
        let mut config = EngineConfig::default();
        config.numbering.purchase_prefix = "PO-".to_string();
        let db = config.db_config();
        assert_eq!(db.numbering.purchase_prefix, "PO-");
        assert_eq!(db.max_connections, 5);
    }
}
