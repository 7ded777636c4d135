//! Configuration file management
//!
//! Loads TOML configuration files and provides discovery and hotplug settings.
//! Default config path: ~/.config/evhub/config.toml

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Error, Result};

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to look for devices
    pub discovery: DiscoveryConfig,
    /// Hotplug timing
    pub hotplug: HotplugConfig,
    /// Which device classes to track
    pub classes: ClassesConfig,
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory of event nodes (generic and joystick classes)
    pub input_root: PathBuf,
    /// Directory of by-path links (keyboard and mouse classes)
    pub by_path_root: PathBuf,
    /// Take exclusive access to each device (EVIOCGRAB)
    /// Other readers, including the console, stop seeing its events
    pub grab: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from(constants::DEFAULT_INPUT_ROOT),
            by_path_root: PathBuf::from(constants::DEFAULT_BY_PATH_ROOT),
            grab: false,
        }
    }
}

/// Hotplug settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotplugConfig {
    /// Longest wait for the first notification of a batch (ms)
    pub wait_timeout_ms: u64,
    /// Delay after the first notification before draining the batch (ms)
    pub settle_delay_ms: u64,
    /// Interval between open attempts on a new node (ms)
    pub retry_interval_ms: u64,
    /// Open attempts before giving up on a new node (0 = unlimited)
    pub retry_limit: u32,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: constants::HOTPLUG_WAIT_TIMEOUT_MS,
            settle_delay_ms: constants::HOTPLUG_SETTLE_DELAY_MS,
            retry_interval_ms: constants::HOTPLUG_RETRY_INTERVAL_MS,
            retry_limit: constants::HOTPLUG_RETRY_LIMIT,
        }
    }
}

/// Device class selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassesConfig {
    /// Every event node, full (type, code, value) events
    pub generic: bool,
    /// by-path keyboards, key events only
    pub keyboard: bool,
    /// by-path mice, buttons and relative motion
    pub mouse: bool,
    /// Gamepad buttons and absolute axes
    pub joystick: bool,
}

impl Default for ClassesConfig {
    fn default() -> Self {
        Self {
            generic: true,
            keyboard: false,
            mouse: false,
            joystick: false,
        }
    }
}

impl Config {
    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. EVHUB_CONFIG environment variable
        if let Ok(path) = std::env::var("EVHUB_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/evhub/config.toml
        if let Some(path) = default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        // 3. System config: /etc/evhub/config.toml
        let system_config = Path::new(constants::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. EVHUB_CONFIG environment variable
    /// 2. ~/.config/evhub/config.toml (user config)
    /// 3. /etc/evhub/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("{}", e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file {}: {}", path.display(), e)))
    }

    /// Parse TOML text; missing keys take their defaults
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Render as TOML (for `--print-config`)
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("evhub").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.discovery.input_root, PathBuf::from("/dev/input"));
        assert_eq!(config.discovery.by_path_root, PathBuf::from("/dev/input/by-path"));
        assert!(!config.discovery.grab);
        assert_eq!(config.hotplug.wait_timeout_ms, 100);
        assert_eq!(config.hotplug.retry_limit, 50);
        assert!(config.classes.generic);
        assert!(!config.classes.joystick);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [hotplug]
            retry_limit = 0

            [classes]
            joystick = true
            "#,
        )
        .unwrap();
        assert_eq!(config.hotplug.retry_limit, 0);
        assert_eq!(config.hotplug.settle_delay_ms, 10);
        assert!(config.classes.joystick);
        assert!(config.classes.generic);
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = Config::default();
        config.discovery.grab = true;
        config.classes.mouse = true;
        let text = config.to_toml().unwrap();
        assert!(text.contains("[hotplug]"));
        assert_eq!(Config::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = crate::testutil::TempDir::new("config");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hotplug]\nretry_limit = \"many\"\n").unwrap();
        assert!(matches!(Config::load_from_file(&path), Err(Error::Config(_))));
        assert!(matches!(
            Config::load_from_file(&dir.path().join("missing.toml")),
            Err(Error::Config(_))
        ));
    }
}
