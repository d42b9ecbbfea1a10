//! Configuration management for rewind.
//!
//! Loads configuration from TOML files. Every section falls back to defaults, so
//! a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub drawing: DrawingConfig,
    pub kill_zone: KillZoneConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations.
    ///
    /// Searches in order:
    /// 1. `./rewind.toml`
    /// 2. `~/.config/rewind/config.toml`
    ///
    /// Returns default config if no file found.
    pub fn load_default() -> Self {
        if let Ok(config) = Self::load(Self::default_path()) {
            return config;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("rewind").join("config.toml");
            if let Ok(config) = Self::load(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Save configuration to a file path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("rewind.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.playback;
        if p.visible_bars == 0 {
            return Err(ConfigError::Invalid("playback.visible_bars must be > 0".into()));
        }
        if p.forward_batch == 0 || p.backfill_batch == 0 {
            return Err(ConfigError::Invalid("playback batch sizes must be > 0".into()));
        }
        if !(-12..=14).contains(&self.kill_zone.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "kill_zone.utc_offset_hours out of range: {}",
                self.kill_zone.utc_offset_hours
            )));
        }
        Ok(())
    }
}

/// Playback engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Milliseconds between playback ticks.
    pub speed_ms: u64,
    /// Bars of history fetched behind the simulated time.
    pub visible_bars: usize,
    /// Extra bars fetched for indicator warm-up.
    pub warmup_bars: usize,
    /// Warm-up is padded with synthetic bars up to this size.
    pub min_warmup_bars: usize,
    /// Fetch forward when fewer bars than this remain ahead.
    pub buffer_threshold: usize,
    /// Bars requested per forward fetch.
    pub forward_batch: usize,
    /// Bars requested per history backfill.
    pub backfill_batch: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_ms: 500,
            visible_bars: 300,
            warmup_bars: 100,
            min_warmup_bars: 100,
            buffer_threshold: 50,
            forward_batch: 500,
            backfill_batch: 1000,
        }
    }
}

/// Drawing interaction defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    /// Snap endpoints to OHLC on the main pane.
    pub magnet: bool,
    /// Pixel distance within which a drawing body counts as hit.
    pub hit_tolerance_px: f64,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            magnet: false,
            hit_tolerance_px: 6.0,
        }
    }
}

/// One recurring daily session window, in reference-zone local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub name: String,
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// RGBA fill color.
    pub color: [f32; 4],
    pub show_label: bool,
}

impl SessionConfig {
    pub fn new(name: &str, start: (u32, u32), end: (u32, u32), color: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap_or(NaiveTime::MIN),
            color,
            show_label: true,
        }
    }
}

/// Kill zone drawing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillZoneConfig {
    /// Fixed reference timezone, hours east of UTC.
    pub utc_offset_hours: i32,
    /// Extend each box's high/low lines to the right edge.
    pub extend_right: bool,
    /// Draw a line halfway between high and low.
    pub show_midline: bool,
    pub sessions: Vec<SessionConfig>,
}

impl Default for KillZoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            extend_right: false,
            show_midline: false,
            sessions: vec![
                SessionConfig::new("Asia", (7, 0), (11, 0), [0.9, 0.3, 0.9, 0.15]),
                SessionConfig::new("London", (14, 0), (17, 0), [0.2, 0.5, 1.0, 0.15]),
                SessionConfig::new("New York", (19, 0), (22, 0), [1.0, 0.6, 0.1, 0.15]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.playback.buffer_threshold, 50);
        assert_eq!(config.kill_zone.utc_offset_hours, 7);
        assert_eq!(config.kill_zone.sessions.len(), 3);
        assert!(!config.drawing.magnet);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[playback]
speed_ms = 250
warmup_bars = 50

[drawing]
magnet = true

[kill_zone]
show_midline = true

[[kill_zone.sessions]]
name = "Overnight"
enabled = true
start = "22:00:00"
end = "02:00:00"
color = [1.0, 1.0, 1.0, 0.2]
show_label = false
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.playback.speed_ms, 250);
        assert_eq!(config.playback.warmup_bars, 50);
        assert_eq!(config.playback.visible_bars, 300);
        assert!(config.drawing.magnet);
        assert!(config.kill_zone.show_midline);
        assert_eq!(config.kill_zone.sessions.len(), 1);
        assert_eq!(
            config.kill_zone.sessions[0].end,
            NaiveTime::from_hms_opt(2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::parse("[playback]\nvisible_bars = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::parse("[kill_zone]\nutc_offset_hours = 20\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("rewind-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.playback.speed_ms = 42;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_dir_all(&dir).ok();
    }
}
