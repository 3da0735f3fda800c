//! Brewbus Settings Crate
//!
//! Handles the application configuration file: loading, saving and validation.

pub mod config;
pub mod error;

pub use config::{AppConfig, ConfigFormat, CONFIG_FILE_NAME};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
