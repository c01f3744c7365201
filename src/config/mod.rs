//! Configuration management for argsense
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::parser::{AliasMap, DEFAULT_MAX_ALIAS_ROUNDS};

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "ARGSENSE_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Completion engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Spec loading configuration
    #[serde(default)]
    pub specs: SpecsConfig,

    /// Aliases merged over the ones discovered from the shell
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

/// Completion engine timing and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline of a whole completion request, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Deadline of a single script generator, in milliseconds
    #[serde(default = "default_script_timeout")]
    pub script_timeout_ms: u64,

    /// Deadline of shell introspection, in milliseconds
    #[serde(default = "default_introspection_timeout")]
    pub introspection_timeout_ms: u64,

    /// Interval for arguments declaring `debounce: true`, in milliseconds
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    /// Bound on alias substitution rounds per command
    #[serde(default = "default_max_alias_rounds")]
    pub max_alias_rounds: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Where completion specs come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecsConfig {
    /// Directory of `*.json` specs; a leading `~` is expanded
    #[serde(default = "default_spec_directory")]
    pub directory: PathBuf,
}

// Default value functions
fn default_request_timeout() -> u64 {
    300
}

fn default_script_timeout() -> u64 {
    5000
}

fn default_introspection_timeout() -> u64 {
    2000
}

fn default_debounce() -> u64 {
    200
}

fn default_max_alias_rounds() -> usize {
    DEFAULT_MAX_ALIAS_ROUNDS
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

fn default_spec_directory() -> PathBuf {
    PathBuf::from("~/.argsense/specs")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout(),
            script_timeout_ms: default_script_timeout(),
            introspection_timeout_ms: default_introspection_timeout(),
            debounce_ms: default_debounce(),
            max_alias_rounds: default_max_alias_rounds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Default for SpecsConfig {
    fn default() -> Self {
        Self {
            directory: default_spec_directory(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Explicit path, or `None` for [`Config::default_path`]
    ///
    /// # Returns
    /// * `Result<Config>` - A missing default file yields defaults; a missing
    ///   explicit file is an error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Apply `ARGSENSE_*` environment overrides
    ///
    /// Recognized: `ARGSENSE_REQUEST_TIMEOUT_MS`, `ARGSENSE_SCRIPT_TIMEOUT_MS`,
    /// `ARGSENSE_INTROSPECTION_TIMEOUT_MS`, `ARGSENSE_DEBOUNCE_MS`,
    /// `ARGSENSE_MAX_ALIAS_ROUNDS`, `ARGSENSE_LOG_LEVEL`, `ARGSENSE_SPEC_DIR`
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(std::env::vars())
    }

    fn apply_vars(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "REQUEST_TIMEOUT_MS" => {
                    self.engine.request_timeout_ms = parse_number(&key, &value)?
                }
                "SCRIPT_TIMEOUT_MS" => self.engine.script_timeout_ms = parse_number(&key, &value)?,
                "INTROSPECTION_TIMEOUT_MS" => {
                    self.engine.introspection_timeout_ms = parse_number(&key, &value)?
                }
                "DEBOUNCE_MS" => self.engine.debounce_ms = parse_number(&key, &value)?,
                "MAX_ALIAS_ROUNDS" => self.engine.max_alias_rounds = parse_number(&key, &value)?,
                "LOG_LEVEL" => self.logging.level = value.parse()?,
                "SPEC_DIR" => self.specs.directory = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".argsense")
            .join("config.toml")
    }

    /// Save configuration to a file
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("engine.request_timeout_ms", self.engine.request_timeout_ms),
            ("engine.script_timeout_ms", self.engine.script_timeout_ms),
            (
                "engine.introspection_timeout_ms",
                self.engine.introspection_timeout_ms,
            ),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(invalid(field, value));
            }
        }

        if self.engine.max_alias_rounds == 0 {
            return Err(invalid("engine.max_alias_rounds", 0));
        }

        if let Some(name) = self.aliases.keys().find(|name| {
            name.is_empty() || name.chars().any(char::is_whitespace)
        }) {
            return Err(invalid("aliases", format!("{name:?}")));
        }

        Ok(())
    }

    /// Aliases from the config file
    pub fn alias_map(&self) -> AliasMap {
        self.aliases.clone()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.request_timeout_ms)
    }

    /// Get script timeout as Duration
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.script_timeout_ms)
    }

    /// Get introspection timeout as Duration
    pub fn introspection_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.introspection_timeout_ms)
    }

    /// Get debounce interval as Duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.engine.debounce_ms)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(field: &str, value: impl ToString) -> crate::error::ArgsenseError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::error::ArgsenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(invalid("logging.level", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArgsenseError;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.request_timeout_ms, 300);
        assert_eq!(config.engine.max_alias_rounds, 16);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.aliases.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [engine]
            request_timeout_ms = 150

            [aliases]
            gco = "git checkout"
            "#,
        )
        .unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(150));
        assert_eq!(config.script_timeout(), Duration::from_secs(5));
        assert_eq!(config.alias_map()["gco"], "git checkout");
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[engine\n").unwrap_err();
        assert!(matches!(err, ArgsenseError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load_from_file(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, ArgsenseError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.engine.debounce_ms = 50;
        config.logging.level = LogLevel::Debug;
        config
            .aliases
            .insert("ll".to_string(), "ls -l".to_string());
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_vars([
                ("ARGSENSE_REQUEST_TIMEOUT_MS".to_string(), "900".to_string()),
                ("ARGSENSE_LOG_LEVEL".to_string(), "TRACE".to_string()),
                ("ARGSENSE_SPEC_DIR".to_string(), "/opt/specs".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ])
            .unwrap();
        assert_eq!(config.engine.request_timeout_ms, 900);
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.specs.directory, PathBuf::from("/opt/specs"));

        let err = config
            .apply_vars([("ARGSENSE_DEBOUNCE_MS".to_string(), "soon".to_string())])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value 'soon' for field 'ARGSENSE_DEBOUNCE_MS'"
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.engine.script_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.aliases.insert("two words".to_string(), "x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
