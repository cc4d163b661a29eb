use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::bridge::BridgeError;

const LOCAL_CONFIG_FILE: &str = "dictation-bridge.toml";
const CONFIG_DIR_NAME: &str = "dictation-bridge";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub input: InputConfig,
}

// ============================================================================
// Bridge Config
// ============================================================================

/// Settings read once when the bridge starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Delay between clipboard reads
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Put a space between dictated text and the word before it
    #[serde(default = "default_auto_space")]
    pub auto_space: bool,

    /// Emit human-readable notices on the status stream
    #[serde(default = "default_status_notifications")]
    pub status_notifications: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            auto_space: default_auto_space(),
            status_notifications: default_status_notifications(),
        }
    }
}

/// Poll intervals outside this range work but are not recommended
const RECOMMENDED_POLL_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=2000;

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !RECOMMENDED_POLL_RANGE_MS.contains(&self.poll_interval_ms) {
            warn!(
                poll_interval_ms = self.poll_interval_ms,
                "poll interval outside the recommended 100-2000ms range"
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_auto_space() -> bool {
    true
}

fn default_status_notifications() -> bool {
    true
}

// ============================================================================
// Input Config
// ============================================================================

/// How the keystroke editor types dictated text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMethod {
    /// Native text input (default, more reliable on macOS)
    #[default]
    Direct,
    /// Set the clipboard, then paste with Cmd/Ctrl+V
    Clipboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub method: InputMethod,
    /// Pause between modifier press and key click
    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            method: InputMethod::default(),
            key_delay_ms: default_key_delay_ms(),
        }
    }
}

fn default_key_delay_ms() -> u64 {
    10
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Otherwise the working directory
    /// and then the user config directory are searched, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Write the config as TOML, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Per-user config file location
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.toml"))
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        paths.extend(Self::user_config_path());
        paths
    }
}
