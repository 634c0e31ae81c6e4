//! Configuration storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::room::sim_devices::SimulatedDeviceConfig;
use crate::room::simulation::SimulationScript;
use crate::room::RoomSettings;

/// Room behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Delay before the simulated host admits a waiting guest.
    pub admission_delay_ms: u64,
    /// Terminal widths below this many columns use the narrow grid.
    pub narrow_viewport_cols: u16,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            admission_delay_ms: 3000,
            narrow_viewport_cols: 100,
        }
    }
}

/// Which capture backend the room uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    #[default]
    Simulated,
    /// Real camera through V4L2 (needs the `video-capture` feature).
    V4l,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: DeviceBackend,
    pub camera_path: String,
    pub simulated: SimulatedDeviceConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: DeviceBackend::Simulated,
            camera_path: "/dev/video0".to_string(),
            simulated: SimulatedDeviceConfig::default(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name pre-filled in the join form
    pub display_name: Option<String>,
    /// Domain used in share links
    pub link_domain: String,
    /// Meetings file; defaults to `meetings.toml` next to this config
    pub meetings_file: Option<PathBuf>,
    pub room: RoomConfig,
    pub devices: DeviceConfig,
    pub simulation: SimulationScript,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_name: None,
            link_domain: "microchurch.app".to_string(),
            meetings_file: None,
            room: RoomConfig::default(),
            devices: DeviceConfig::default(),
            simulation: SimulationScript::default(),
        }
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("app", "microchurch", "microchurch-meet")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, or the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`, or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;
        Ok(path)
    }

    /// Where the meeting list is read from
    pub fn meetings_path(&self) -> Result<PathBuf> {
        match &self.meetings_file {
            Some(p) => Ok(p.clone()),
            None => Ok(Self::config_dir()?.join("meetings.toml")),
        }
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            admission_delay: Duration::from_millis(self.room.admission_delay_ms),
        }
    }
}
