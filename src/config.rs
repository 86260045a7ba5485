//! Configuration loaded from `~/.config/adskip/config.toml`.
//!
//! ```toml
//! [settings]
//! skip_ads = true
//! skip_intro = true
//! skip_credits = true
//!
//! [controller]
//! poll_interval_ms = 1000
//! fast_forward_rate = 16.0
//! fast_forward_window_ms = 3000
//! ```
//!
//! Every key is optional. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

fn enabled() -> bool {
    true
}

/// User preferences.
///
/// Only `skip_ads` changes controller behavior. `skip_intro` and
/// `skip_credits` are carried for the settings UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "enabled")]
    pub skip_ads: bool,
    #[serde(default = "enabled")]
    pub skip_intro: bool,
    #[serde(default = "enabled")]
    pub skip_credits: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skip_ads: true,
            skip_intro: true,
            skip_credits: true,
        }
    }
}

/// Controller timing and correction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Cadence of the video re-acquisition poll.
    pub poll_interval_ms: u64,
    /// Playback multiplier used while skipping.
    pub fast_forward_rate: f64,
    /// Wall-clock length of a blind fast-forward.
    pub fast_forward_window_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            fast_forward_rate: 16.0,
            fast_forward_window_ms: 3000,
        }
    }
}

impl ControllerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn fast_forward_window(&self) -> Duration {
        Duration::from_millis(self.fast_forward_window_ms)
    }
}

/// Top-level config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`, returning defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adskip")
        .join("config.toml")
}

/// Source of user settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings>;
}

/// Reads the `[settings]` table of a config file on every load.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new(config_path())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<Settings> {
        let path = self.path.clone();
        let config = tokio::task::spawn_blocking(move || AppConfig::load_from(&path))
            .await
            .map_err(std::io::Error::other)??;
        Ok(config.settings)
    }
}

/// Fixed settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSettings(pub Settings);

#[async_trait]
impl SettingsStore for StaticSettings {
    async fn load(&self) -> Result<Settings> {
        Ok(self.0)
    }
}
