mod settings;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::midi::{KeyMapping, LinearMapping, ReversedMapping, SteppedMapping};

pub use settings::{SettingValue, SettingsProvider, SettingsStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    Reversed,
}

impl Orientation {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Orientation::Normal),
            "reversed" | "reverse" => Some(Orientation::Reversed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MappingKind {
    #[default]
    Linear,
    Reversed,
    Stepped { step: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    pub led_count: u32,
    /// Note number rendered on the first LED
    pub low_note: u8,
    /// 0.0 -> 1.0
    pub brightness: f32,
    pub orientation: Orientation,
    /// Drive the physical strip. When false the simulation renderer is used.
    pub enabled: bool,
    pub gpio_pin: u8,
    /// spidev node wired to `gpio_pin`
    pub device: PathBuf,
    pub mapping: MappingKind,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            led_count: 88,
            low_note: 21,
            brightness: 0.5,
            orientation: Orientation::Normal,
            enabled: false,
            gpio_pin: 10,
            device: PathBuf::from("/dev/spidev0.0"),
            mapping: MappingKind::Linear,
        }
    }
}

impl LedConfig {
    pub fn from_settings(settings: &dyn SettingsProvider) -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: f64| {
            settings
                .get("led", key, SettingValue::Number(default))
                .as_f64()
                .unwrap_or(default)
        };

        let orientation = settings
            .get("led", "orientation", SettingValue::Nil)
            .as_str()
            .and_then(Orientation::from_name)
            .unwrap_or(defaults.orientation);

        let mapping = match settings
            .get("led", "mapping", SettingValue::Nil)
            .as_str()
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("reversed") | Some("reverse") => MappingKind::Reversed,
            Some("stepped") | Some("step") => MappingKind::Stepped {
                step: number("mapping_step", 1.0).max(1.0) as u32,
            },
            _ => MappingKind::Linear,
        };

        let device = settings
            .get("led", "device", SettingValue::Nil)
            .as_str()
            .map(PathBuf::from)
            .unwrap_or(defaults.device);

        Self {
            led_count: number("led_count", defaults.led_count as f64).max(0.0) as u32,
            low_note: number("low_note", defaults.low_note as f64).clamp(0.0, 127.0) as u8,
            brightness: number("brightness", defaults.brightness as f64).clamp(0.0, 1.0) as f32,
            orientation,
            enabled: settings
                .get("led", "enabled", SettingValue::Boolean(defaults.enabled))
                .as_bool()
                .unwrap_or(defaults.enabled),
            gpio_pin: number("gpio_pin", defaults.gpio_pin as f64) as u8,
            device,
            mapping,
        }
    }

    /// Builds the note-to-LED strategy selected by `mapping`.
    pub fn key_mapping(&self) -> Box<dyn KeyMapping> {
        match self.mapping {
            MappingKind::Linear => Box::new(LinearMapping::new(self.low_note, self.led_count)),
            MappingKind::Reversed => {
                Box::new(ReversedMapping::new(self.low_note, self.led_count))
            }
            MappingKind::Stepped { step } => {
                Box::new(SteppedMapping::new(self.low_note, self.led_count, step))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upper bound on how long the dispatch loop sleeps between wall clock checks
    pub poll_interval_ms: u64,
    /// Scale the note color by velocity / 127
    pub velocity_sensitive: bool,
    pub on_color: (u8, u8, u8),
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            velocity_sensitive: true,
            on_color: (255, 255, 255),
        }
    }
}

impl PlaybackConfig {
    pub fn from_settings(settings: &dyn SettingsProvider) -> Self {
        let defaults = Self::default();

        let on_color = settings
            .get("playback", "on_color", SettingValue::Nil)
            .as_str()
            .and_then(parse_hex_color)
            .unwrap_or(defaults.on_color);

        Self {
            poll_interval_ms: settings
                .get(
                    "playback",
                    "poll_interval_ms",
                    SettingValue::Number(defaults.poll_interval_ms as f64),
                )
                .as_f64()
                .map(|ms| ms.max(1.0) as u64)
                .unwrap_or(defaults.poll_interval_ms),
            velocity_sensitive: settings
                .get(
                    "playback",
                    "velocity_sensitive",
                    SettingValue::Boolean(defaults.velocity_sensitive),
                )
                .as_bool()
                .unwrap_or(defaults.velocity_sensitive),
            on_color,
        }
    }
}

/// Parses `#rrggbb` or `rrggbb`.
fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub led: LedConfig,
    pub playback: PlaybackConfig,
}

impl AppConfig {
    pub fn from_settings(settings: &dyn SettingsProvider) -> Self {
        Self {
            led: LedConfig::from_settings(settings),
            playback: PlaybackConfig::from_settings(settings),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let config: AppConfig = ron::from_str(&ron_string)?;

        Ok(config)
    }
}
