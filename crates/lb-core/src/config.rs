//! Configuration system for the lake-bridge session bridge

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub general: GeneralConfig,
    pub session: SessionConfig,
    pub rom: RomConfig,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// General front-end settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct GeneralConfig {
    /// Begin every session with the user pause engaged
    pub start_paused: bool,
}

/// Session timing and synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for acquiring the session lock
    pub lock_timeout_ms: u64,
    /// Upper bound the host waits for the runner to acknowledge a pause
    pub pause_timeout_ms: u64,
    /// Runner sleep between event polls when no frame is due
    pub idle_tick_ms: u64,
}

/// ROM loading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RomConfig {
    /// Largest image the loader will materialize
    pub max_size_bytes: usize,
    /// Strip a 512-byte copier header when present
    pub strip_copier_header: bool,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory for cartridge battery saves
    pub save_dir: PathBuf,
    /// Persist battery RAM on ROM swap and shutdown
    pub battery_saves: bool,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    pub log_to_file: bool,
    pub log_path: PathBuf,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

// Default implementations

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 500,
            pause_timeout_ms: 250,
            idle_tick_ms: 1,
        }
    }
}

impl SessionConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn pause_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_timeout_ms)
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms.max(1))
    }
}

impl Default for RomConfig {
    fn default() -> Self {
        Self {
            // Largest ExHiROM boards plus a copier header
            max_size_bytes: 8 * 1024 * 1024 + 512,
            strip_copier_header: true,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lake-bridge");

        Self {
            save_dir: base.join("saves"),
            battery_saves: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_to_file: false,
            log_path: PathBuf::from("lake-bridge.log"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loading configuration from {}", path.display());
        toml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lake-bridge")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.general.start_paused);
        assert_eq!(config.session.pause_timeout(), Duration::from_millis(250));
        assert!(config.rom.strip_copier_header);
        assert!(config.paths.battery_saves);
        assert_eq!(config.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.session.lock_timeout_ms = 42;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.session.lock_timeout_ms, 42);
        assert_eq!(parsed.rom.max_size_bytes, config.rom.max_size_bytes);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[general]\nstart_paused = true\n").unwrap();
        assert!(parsed.general.start_paused);
        assert_eq!(parsed.session.idle_tick_ms, 1);
    }

    #[test]
    fn test_idle_tick_never_zero() {
        let session = SessionConfig {
            idle_tick_ms: 0,
            ..SessionConfig::default()
        };
        assert_eq!(session.idle_tick(), Duration::from_millis(1));
    }
}
