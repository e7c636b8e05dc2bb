//! Configuration management for HeroReel
//!
//! This module handles loading and managing application configuration
//! from config files and environment variables. Command line flags are
//! applied on top by the binary.

use crate::player::SchedulerConfig;
use crate::utils::error::{HeroReelError, IntoReelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// General application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Clip set JSON file to schedule
    pub clips_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            clips_path: None,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/heroreel/config.toml on Linux)
    /// 3. User config file (~/.config/heroreel/config.toml on Linux)
    /// 4. Environment variables (HEROREEL_* prefix)
    pub fn load() -> Result<Self> {
        let files: Vec<PathBuf> = [Self::system_config_path(), Self::user_config_path()]
            .into_iter()
            .flatten()
            .collect();

        let mut config = Self::from_files(&files)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Merge the given TOML files over the defaults; missing files are skipped
    pub fn from_files(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Value::try_from(Self::default())
            .config_err("Failed to serialize default config")?;

        for path in paths.iter().filter(|p| p.exists()) {
            log::debug!("Merging config file {:?}", path);
            merge_values(&mut merged, Self::read_file(path)?);
        }

        merged.try_into().config_err("Invalid configuration")
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| HeroReelError::Config("Cannot determine user config path".to_string()))?;
        self.save_to(&path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    fn read_file(path: &Path) -> Result<toml::Value> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        toml::from_str(&contents).config_err(&format!("Failed to parse {}", path.display()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(fade) = std::env::var("HEROREEL_FADE_DURATION_MS") {
            self.scheduler.fade_duration_ms = fade
                .parse()
                .map_err(|_| HeroReelError::Config("Invalid HEROREEL_FADE_DURATION_MS".to_string()))?;
        }

        if let Ok(randomize) = std::env::var("HEROREEL_RANDOMIZE") {
            self.scheduler.randomize = parse_flag("HEROREEL_RANDOMIZE", &randomize)?;
        }

        if let Ok(skip) = std::env::var("HEROREEL_MANUAL_SKIP") {
            self.scheduler.manual_skip_enabled = parse_flag("HEROREEL_MANUAL_SKIP", &skip)?;
        }

        if let Ok(log_level) = std::env::var("HEROREEL_LOG_LEVEL") {
            self.general.log_level = log_level.to_lowercase();
        }

        if let Ok(clips) = std::env::var("HEROREEL_CLIPS") {
            self.general.clips_path = Some(PathBuf::from(clips));
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;

        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(HeroReelError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level, VALID_LOG_LEVELS
            )));
        }

        Ok(())
    }

    /// Get system config file path
    pub fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/heroreel/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA").ok()
            .map(|p| PathBuf::from(p).join("HeroReel").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/HeroReel/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return dirs::config_dir().map(|p| p.join("heroreel").join("config.toml"));

        #[cfg(not(target_os = "linux"))]
        return dirs::config_dir().map(|p| p.join("HeroReel").join("config.toml"));
    }
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HeroReelError::Config(format!("Invalid {}: '{}'", name, value))),
    }
}
