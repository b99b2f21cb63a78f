//! Tool configuration.
//!
//! Handles loading, validating, and merging `avatar-resizer.toml`. Stock
//! defaults are the base layer; a user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [thumbnail]
//! size = 128                      # Square avatar edge in pixels
//!
//! [fetch]
//! user_agent = "Mozilla/5.0"      # Sent with every request; must not be empty
//! connect_timeout_secs = 5
//! read_timeout_secs = 5
//! max_body_bytes = 20971520       # 20 MiB
//!
//! [jobs]
//! workers = 4                     # Fixed worker pool size
//! shutdown_timeout_secs = 60      # Grace period before in-flight jobs are abandoned
//!
//! [output]
//! dir = "avatars"                 # Where the CLI writes PNGs
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DEFAULT_AVATAR_SIZE, ThumbnailSize};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "avatar-resizer.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Output thumbnail settings.
    pub thumbnail: ThumbnailConfig,
    /// HTTP fetch settings.
    pub fetch: FetchConfig,
    /// Worker pool settings.
    pub jobs: JobsConfig,
    /// CLI output settings.
    pub output: OutputConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.size must be non-zero".into(),
            ));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fetch.user_agent must not be empty".into(),
            ));
        }
        if self.fetch.connect_timeout_secs == 0 || self.fetch.read_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch timeouts must be non-zero".into(),
            ));
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_body_bytes must be non-zero".into(),
            ));
        }
        if self.jobs.workers == 0 {
            return Err(ConfigError::Validation(
                "jobs.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Output thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    /// Edge length of the square output.
    pub size: u32,
}

impl ThumbnailConfig {
    pub fn thumbnail_size(&self) -> Result<ThumbnailSize, ConfigError> {
        ThumbnailSize::square(self.size).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_AVATAR_SIZE,
        }
    }
}

/// HTTP fetch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Largest response body accepted, in bytes.
    pub max_body_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    /// Number of long-lived workers. Fixed for the orchestrator's lifetime.
    pub workers: usize,
    /// How long `shutdown` waits for in-flight work before aborting it.
    pub shutdown_timeout_secs: u64,
}

impl JobsConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            shutdown_timeout_secs: 60,
        }
    }
}

/// CLI output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "avatars".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# avatar-resizer configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output thumbnail
# ---------------------------------------------------------------------------
[thumbnail]
# Edge length of the square avatar, in pixels.
size = 128

# ---------------------------------------------------------------------------
# Fetching source images
# ---------------------------------------------------------------------------
[fetch]
# Sent with every request. Some hosts reject empty or library-default agents.
user_agent = "Mozilla/5.0"

# Seconds to wait for a TCP/TLS connection, and between reads of the body.
connect_timeout_secs = 5
read_timeout_secs = 5

# Largest image download accepted, in bytes (20 MiB).
max_body_bytes = 20971520

# ---------------------------------------------------------------------------
# Background jobs
# ---------------------------------------------------------------------------
[jobs]
# Fixed number of workers processing queued jobs concurrently.
workers = 4

# Seconds to wait for in-flight jobs on shutdown before abandoning them.
shutdown_timeout_secs = 60

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Directory the CLI writes PNG avatars into. Existing files are never
# overwritten; a numeric suffix is added instead (avatar_1.png, ...).
dir = "avatars"
"##
}
