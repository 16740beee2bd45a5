//! Configuration file parsing and structures.
//!
//! hmipd uses TOML for declarative configuration. Native integrations are
//! statically typed and live under `[integrations.<name>]`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

#[cfg(feature = "integration_homematicip")]
use crate::integrations::homematicip::HomematicipConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP API; disabled when the section is absent
    #[serde(default)]
    pub api: Option<ApiConfig>,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(
    Debug,
    Default,
    Deserialize,
    Serialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `hmipd::integrations::homematicip = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build `EnvFilter` directives: the global level followed by sorted per-target overrides.
    pub fn env_filter_directives(&self) -> String {
        let mut directives = vec![LevelFilter::from(self.level).to_string().to_lowercase()];

        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));
        for (target, level) in overrides {
            directives.push(format!(
                "{}={}",
                target,
                LevelFilter::from(*level).to_string().to_lowercase()
            ));
        }

        directives.join(",")
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// Native HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// HomematicIP cloud access point
    #[cfg(feature = "integration_homematicip")]
    #[serde(default)]
    pub homematicip: Option<HomematicipConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(api) = &self.api {
            if api.listen.trim().is_empty() {
                return Err(ConfigError::Invalid("api.listen must not be empty".into()));
            }
        }

        #[cfg(feature = "integration_homematicip")]
        if let Some(hmip) = &self.integrations.homematicip {
            hmip.validate().map_err(ConfigError::Invalid)?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
