//! Configuration loading and typed config structures for a Chronicle world.
//!
//! The canonical configuration lives in `chronicle-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Environment variable that overrides `world.database_path`.
pub const DATABASE_ENV: &str = "CHRONICLE_DATABASE";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `chronicle-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChronicleConfig {
    /// World-level settings (name, store location, start time).
    #[serde(default)]
    pub world: WorldConfig,

    /// Acting scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Parameters for the demonstration binary.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl ChronicleConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// The environment variable [`DATABASE_ENV`] overrides
    /// `world.database_path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// Does not consult the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DATABASE_ENV) {
            self.world.database_path = path;
        }
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.default_interval_ms <= 0 {
            return Err(ConfigError::Invalid {
                reason: "scheduler.default_interval_ms must be positive".to_owned(),
            });
        }
        if self.demo.step_ms <= 0 {
            return Err(ConfigError::Invalid {
                reason: "demo.step_ms must be positive".to_owned(),
            });
        }
        if self.demo.total_duration_ms < 0 {
            return Err(ConfigError::Invalid {
                reason: "demo.total_duration_ms must not be negative".to_owned(),
            });
        }
        if self.demo.rooms.len() < 2 {
            return Err(ConfigError::Invalid {
                reason: "demo.rooms must name at least two rooms".to_owned(),
            });
        }
        if self.world.database_path.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "world.database_path must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable world name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Path of the `SQLite` file, or `:memory:` for a throwaway world.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// World time (ms) the clock starts at when the store is fresh.
    #[serde(default)]
    pub start_time_ms: i64,

    /// Calendar instant that world time zero corresponds to.
    #[serde(default = "default_epoch")]
    pub epoch: NaiveDateTime,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            database_path: default_database_path(),
            start_time_ms: 0,
            epoch: default_epoch(),
        }
    }
}

/// Acting scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Polling interval used by behaviours that do not choose their own.
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Parameters for the demonstration binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemoConfig {
    /// Seed for the wanderer's random choices.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// How far the avatar waits per step (ms).
    #[serde(default = "default_step_ms")]
    pub step_ms: i64,

    /// Total world time to simulate (ms).
    #[serde(default = "default_total_duration_ms")]
    pub total_duration_ms: i64,

    /// Names of the rooms the wanderer moves between.
    #[serde(default = "default_rooms")]
    pub rooms: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            step_ms: default_step_ms(),
            total_duration_ms: default_total_duration_ms(),
            rooms: default_rooms(),
        }
    }
}

fn default_world_name() -> String {
    "Chronicle".to_owned()
}

fn default_database_path() -> String {
    chronicle_db::IN_MEMORY.to_owned()
}

fn default_epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

const fn default_interval_ms() -> i64 {
    60_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_step_ms() -> i64 {
    900_000
}

const fn default_total_duration_ms() -> i64 {
    10_800_000
}

fn default_rooms() -> Vec<String> {
    vec![
        "hall".to_owned(),
        "library".to_owned(),
        "kitchen".to_owned(),
        "garden".to_owned(),
    ]
}
