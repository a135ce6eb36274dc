//! CLI configuration.
//!
//! Sources, applied in order with later sources overriding earlier ones:
//!  1. `<user config dir>/archive-replay/config.toml` if it exists
//!  2. The file given by `--config` / `ARCHIVE_REPLAY_CONFIG`, which must exist
//!  3. Environment variables prefixed `ARCHIVE_REPLAY__` with a double
//!     underscore separator, e.g. `ARCHIVE_REPLAY__REPLAY__POLL_INTERVAL_SECONDS=10`
//!
//! Every field has a default, so running without any configuration is valid.
//! Command-line flags are applied on top by the caller.

use archive_replay_core::{
    publisher::DEFAULT_EVENT_COUNT,
    stack_outputs::{DEFAULT_STACK_NAME, OUTPUTS_FILE_NAME},
    ReplaySettings, SyntheticEventTemplate,
};
use event_bus_runtime::{EventBridgeConfig, InMemoryConfig, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Directory below the user config dir holding the config file
pub const CONFIG_DIR_NAME: &str = "archive-replay";

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "ARCHIVE_REPLAY";

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub event_bus: EventBusSettings,
    pub outputs: OutputsSettings,
    pub replay: ReplayConfig,
    pub publish: PublishConfig,
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Reject values no command can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay.lookback_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "replay.lookback_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.replay.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "replay.poll_interval_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.publish.count == 0 {
            return Err(ConfigError::Invalid {
                key: "publish.count".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.outputs.stack_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "outputs.stack_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Which event bus backend to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// AWS EventBridge
    #[default]
    #[value(name = "eventbridge")]
    EventBridge,
    /// In-process bus, for local runs
    Memory,
}

/// Event bus connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventBusSettings {
    pub provider: ProviderKind,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
}

impl EventBusSettings {
    pub fn provider_config(&self) -> ProviderConfig {
        match self.provider {
            ProviderKind::EventBridge => ProviderConfig::EventBridge(EventBridgeConfig {
                region: self.region.clone(),
                endpoint_url: self.endpoint_url.clone(),
            }),
            ProviderKind::Memory => ProviderConfig::InMemory(InMemoryConfig::default()),
        }
    }
}

/// Where the deployment outputs document lives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputsSettings {
    /// Explicit document path; skips the directory search when set
    pub file: Option<PathBuf>,
    pub file_name: String,
    pub stack_name: String,
    pub search_root: PathBuf,
}

impl Default for OutputsSettings {
    fn default() -> Self {
        Self {
            file: None,
            file_name: OUTPUTS_FILE_NAME.to_string(),
            stack_name: DEFAULT_STACK_NAME.to_string(),
            search_root: PathBuf::from("."),
        }
    }
}

/// Replay timing, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub lookback_seconds: u64,
    pub poll_interval_seconds: u64,
    pub settle_margin_seconds: u64,
    pub max_wait_seconds: Option<u64>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        let defaults = ReplaySettings::default();
        Self {
            lookback_seconds: defaults.lookback.as_secs(),
            poll_interval_seconds: defaults.poll_interval.as_secs(),
            settle_margin_seconds: defaults.settle_margin.as_secs(),
            max_wait_seconds: defaults.max_wait.map(|max_wait| max_wait.as_secs()),
        }
    }
}

impl ReplayConfig {
    pub fn settings(&self) -> ReplaySettings {
        ReplaySettings {
            lookback: Duration::from_secs(self.lookback_seconds),
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            settle_margin: Duration::from_secs(self.settle_margin_seconds),
            max_wait: self.max_wait_seconds.map(Duration::from_secs),
        }
    }
}

/// Synthetic event settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PublishConfig {
    pub count: usize,
    pub source: String,
    pub detail_type: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        let template = SyntheticEventTemplate::default();
        Self {
            count: DEFAULT_EVENT_COUNT,
            source: template.source,
            detail_type: template.detail_type,
        }
    }
}

impl PublishConfig {
    pub fn template(&self) -> SyntheticEventTemplate {
        SyntheticEventTemplate {
            source: self.source.clone(),
            detail_type: self.detail_type.clone(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogFormat {
    #[default]
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

// ============================================================================
// Loading
// ============================================================================

/// Location of the per-user config file, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from the standard sources
pub fn load_configuration(explicit_path: Option<&Path>) -> Result<CliConfig, ConfigError> {
    load_configuration_from(user_config_path().as_deref(), explicit_path, ENV_PREFIX)
}

/// Load configuration from the given user file, explicit file and env prefix
pub fn load_configuration_from(
    user_path: Option<&Path>,
    explicit_path: Option<&Path>,
    env_prefix: &str,
) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = user_path {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    if let Some(path) = explicit_path {
        if !path.is_file() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let cli_config: CliConfig = builder
        .add_source(config::Environment::with_prefix(env_prefix).separator("__"))
        .build()?
        .try_deserialize()?;

    cli_config.validate()?;
    Ok(cli_config)
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}
