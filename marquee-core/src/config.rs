//! TOML configuration with a commented template written on first run.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_DIR_NAME: &str = "marquee";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarqueeConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Push channel and snapshot endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Base URL of the playback info server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the server-push subscription endpoint.
    #[serde(default = "default_push_path")]
    pub push_path: String,
    /// Path of the one-shot snapshot endpoint.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// How long the push channel may stay silent before it is considered
    /// stale and torn down.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
    /// Fixed delay between reconnection attempts and fetch retries.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_push_path() -> String {
    "/playbackinfoflux".to_string()
}

fn default_snapshot_path() -> String {
    "/playbackinfo".to_string()
}

const fn default_heartbeat_timeout() -> u64 {
    60_000
}

const fn default_retry_delay() -> u64 {
    5_000
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            push_path: default_push_path(),
            snapshot_path: default_snapshot_path(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub const fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Extrapolation and idle watchdog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Period of the local progress tick.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// How long the display tolerates total silence before going idle.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    /// Delay before the lightweight fetch issued when a track runs out.
    #[serde(default = "default_track_end_refetch_delay")]
    pub track_end_refetch_delay_ms: u64,
    /// Post-track-end ticks tolerated before forcing a full resync.
    #[serde(default = "default_max_post_end_refetches")]
    pub max_post_end_refetches: u32,
}

const fn default_tick_interval() -> u64 {
    500
}

const fn default_idle_timeout() -> u64 {
    60 * 60 * 1000
}

const fn default_track_end_refetch_delay() -> u64 {
    200
}

const fn default_max_post_end_refetches() -> u32 {
    4
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            idle_timeout_ms: default_idle_timeout(),
            track_end_refetch_delay_ms: default_track_end_refetch_delay(),
            max_post_end_refetches: default_max_post_end_refetches(),
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    #[must_use]
    pub const fn track_end_refetch_delay(&self) -> Duration {
        Duration::from_millis(self.track_end_refetch_delay_ms)
    }
}

/// Cosmetic display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Placeholder artwork shown when the source reports none.
    #[serde(default = "default_idle_image")]
    pub idle_image: String,
    /// Status line shown when no track is known.
    #[serde(default = "default_status_fallback")]
    pub status_fallback: String,
}

fn default_idle_image() -> String {
    "img/idle.png".to_string()
}

fn default_status_fallback() -> String {
    "Now Playing".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            idle_image: default_idle_image(),
            status_fallback: default_status_fallback(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file next to the config.
    #[serde(default)]
    pub enabled: bool,
}

pub const CONFIG_TEMPLATE: &str = r#"# marquee configuration

[stream]
# Base URL of the playback info server
base_url = "http://127.0.0.1:8080"
# Server-push subscription endpoint
push_path = "/playbackinfoflux"
# One-shot snapshot endpoint (?full=true fetches the complete state)
snapshot_path = "/playbackinfo"
# Tear the push channel down after this much silence (milliseconds)
heartbeat_timeout_ms = 60000
# Fixed delay between reconnect attempts and fetch retries (milliseconds)
retry_delay_ms = 5000

[progress]
# Local progress tick period (milliseconds)
tick_interval_ms = 500
# Hide the display after this much total silence (milliseconds)
idle_timeout_ms = 3600000
# Delay before refetching when a track runs out (milliseconds)
track_end_refetch_delay_ms = 200
# Post-track-end ticks tolerated before forcing a full resync
max_post_end_refetches = 4

[display]
# Placeholder artwork shown when the source reports none
idle_image = "img/idle.png"
# Status line shown when no track is known
status_fallback = "Now Playing"

[logging]
# Also write logs to marquee.log next to this file
enabled = false
"#;

impl MarqueeConfig {
    /// Path of the config file inside the platform config directory, or the
    /// working directory when none is available.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Load the config, writing a commented template on first run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after creating the template so
    /// the caller can tell the operator to edit it, [`CoreError::ConfigParse`]
    /// for TOML syntax errors, and [`CoreError::Io`] for filesystem failures.
    pub fn load_or_create() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, CONFIG_TEMPLATE)?;
            return Err(CoreError::ConfigNotFound { path });
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }
}
