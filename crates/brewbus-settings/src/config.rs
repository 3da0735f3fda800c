//! Application configuration for Brewbus
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats; the default location is inside the
//! platform-specific configuration directory.
//!
//! Configuration is organized into two sections:
//! - Event bus settings (worker count, queue capacity)
//! - Coffee machine settings (menu, coins, brew time)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use brewbus_core::EventBusConfig;
use brewbus_machine::CoffeeMachineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the default configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json` files
    Json,
    /// `.toml` files
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Event bus settings
    #[serde(default)]
    pub bus: EventBusConfig,
    /// Coffee machine settings
    #[serde(default)]
    pub machine: CoffeeMachineConfig,
}

impl AppConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location, `<config dir>/brewbus/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| SettingsError::ConfigDirectory("no config directory".to_string()))?;
        Ok(dir.join("brewbus").join(CONFIG_FILE_NAME))
    }

    /// Load the config at `path`, or the defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let format = ConfigFormat::from_path(path)?;

        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.bus.validate()?;
        self.machine.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus.pool_size, 4);
        assert_eq!(config.machine.available_coins.len(), 4);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/config.json")).ok(),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.toml")).ok(),
            Some(ConfigFormat::Toml)
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("config.yaml")),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
        assert!(ConfigFormat::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let mut config = AppConfig::new();
        config.bus.pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Bus(_))));

        let mut config = AppConfig::new();
        config.machine.coffees.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Machine(_))));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: AppConfig = toml::from_str("[bus]\npool_size = 2\n").expect("valid toml");
        assert_eq!(config.bus.pool_size, 2);
        assert_eq!(config.bus.queue_capacity, 1024);
        assert_eq!(config.machine, CoffeeMachineConfig::default());
    }

    #[test]
    fn test_default_path_ends_with_file_name() {
        if let Ok(path) = AppConfig::default_path() {
            assert!(path.ends_with(Path::new("brewbus").join(CONFIG_FILE_NAME)));
        }
    }
}
