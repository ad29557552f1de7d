//! TOML-based configuration persistence for the studio-control CLI.
//!
//! Reads and writes [`AppConfig`] at the platform-appropriate config file:
//! - Windows:  `%APPDATA%\StudioControl\config.toml`
//! - Linux:    `~/.config/studio-control/config.toml`
//! - macOS:    `~/Library/Application Support/StudioControl/config.toml`
//!
//! Example file:
//!
//! ```toml
//! [channel]
//! command_key = "comerge:studio-control:command"
//! state_key = "comerge:studio-control:state"
//! interval_ms = 300
//! durable = true
//! source = "desk-launcher"
//!
//! [storage]
//! path = "/run/user/1000/studio-control.json"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a serde default, so an empty or partial file is valid and
//! upgrades from older files keep working.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studio_control_core::domain::options::{
    DEFAULT_ACK_KEY, DEFAULT_COMMAND_KEY, DEFAULT_INTERVAL, DEFAULT_STATE_KEY,
};
use studio_control_core::ChannelOptions;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key names and polling behaviour of the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    #[serde(default = "default_command_key")]
    pub command_key: String,
    #[serde(default = "default_ack_key")]
    pub ack_key: String,
    #[serde(default = "default_state_key")]
    pub state_key: String,
    /// Poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// `false` selects minimal mode: no ack key is read or written.
    #[serde(default = "default_true")]
    pub durable: bool,
    /// Tag attached to emitted commands and published states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Where the shared store lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Store file path.  Absent means `comerge-studio-control.json` in the
    /// directory holding this settings file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_command_key() -> String {
    DEFAULT_COMMAND_KEY.to_string()
}
fn default_ack_key() -> String {
    DEFAULT_ACK_KEY.to_string()
}
fn default_state_key() -> String {
    DEFAULT_STATE_KEY.to_string()
}
fn default_interval_ms() -> u64 {
    u64::try_from(DEFAULT_INTERVAL.as_millis()).unwrap_or(300)
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_key: default_command_key(),
            ack_key: default_ack_key(),
            state_key: default_state_key(),
            interval_ms: default_interval_ms(),
            durable: default_true(),
            source: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ChannelConfig {
    /// Converts the file representation into [`ChannelOptions`].
    pub fn to_options(&self) -> ChannelOptions {
        ChannelOptions {
            command_key: self.command_key.clone(),
            ack_key: self.durable.then(|| self.ack_key.clone()),
            state_key: self.state_key.clone(),
            interval: Duration::from_millis(self.interval_ms),
            source: self.source.clone(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`]; additionally [`ConfigError::NoPlatformConfigDir`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Persists `config` to the platform config file.
///
/// # Errors
///
/// See [`save_config_to`]; additionally [`ConfigError::NoPlatformConfigDir`].
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Resolves the platform config directory including the application folder.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("StudioControl"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("studio-control"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("StudioControl")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
