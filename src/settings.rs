//! Tuning constants for a level, optionally overridden from a JSON file.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, io, path::Path};

/// Where settings are read from unless `CANNON_SETTINGS` says otherwise.
pub const DEFAULT_SETTINGS_PATH: &str = "assets/settings.json";

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameSettings {
    /// Render world width in pixels. Also the window width.
    pub world_width: f32,
    /// Render world height in pixels. Also the window height.
    pub world_height: f32,
    /// Downward gravity in physics units per second squared.
    pub gravity: f32,
    /// Seconds the player has to knock the tower down.
    pub max_playing_time: u32,
    /// Books must all lie below `world_height / win_level`.
    pub win_level: f32,
    pub tower_layers: u32,

    // Cannon
    pub overheat_temperature: f32,
    pub shot_heat: f32,
    pub cooling_divisor: f32,
    pub reload_millis: u64,
    pub muzzle_impulse: f32,
    pub recoil_factor: f32,

    // Controls
    /// Radians per 1/60 s of holding an aim key.
    pub barrel_step: f32,
    /// Wheel motor speed in radians per second.
    pub drive_speed: f32,

    // Audio
    /// Squared velocity change per tick that counts as an impact.
    pub impact_threshold: f32,
    pub sound: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            world_width: 1024.0,
            world_height: 768.0,
            gravity: 10.0,
            max_playing_time: 60,
            win_level: 4.0,
            tower_layers: 12,

            overheat_temperature: 150.0,
            shot_heat: 50.0,
            cooling_divisor: 64.0,
            reload_millis: 250,
            muzzle_impulse: 200.0,
            recoil_factor: 0.5,

            barrel_step: 0.01,
            drive_speed: 2.0,

            impact_threshold: 400.0,
            sound: true,
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(err) => write!(f, "cannot read settings: {err}"),
            SettingsError::Parse(err) => write!(f, "invalid settings: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(err) => Some(err),
            SettingsError::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse(err)
    }
}

impl GameSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Falls back to the defaults when the file is missing or broken.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(SettingsError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("{err}; using defaults");
                Self::default()
            }
        }
    }

    /// Settings path, honouring the `CANNON_SETTINGS` override.
    pub fn path() -> String {
        std::env::var("CANNON_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string())
    }

    /// Height below which every book must fall, in physics units.
    pub fn win_height(&self) -> f32 {
        crate::game::rw2pw(self.world_height / self.win_level)
    }
}
