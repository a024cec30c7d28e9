//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\minim\config.toml
//! - macOS: ~/Library/Application Support/minim/config.toml
//! - Linux: ~/.config/minim/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded once
//! at process start; CLI flags override them per invocation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// Database settings
    pub database: DatabaseConfig,
}

/// Library settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root directory to sync when the CLI doesn't name one
    pub root: Option<PathBuf>,
}

/// Database settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (defaults to minim.db in the working directory)
    pub path: Option<PathBuf>,
}

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("minim"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk, creating the config directory if needed.
pub fn save(config: &Config) -> Result<()> {
    let Some(dir) = config_dir() else {
        return Err(Error::config("could not determine config directory"));
    };
    std::fs::create_dir_all(&dir)?;

    let path = dir.join("config.toml");
    let contents =
        toml::to_string_pretty(config).map_err(|e| Error::config(format!("serialize: {e}")))?;
    std::fs::write(&path, contents)?;
    tracing::info!("Saved config to {:?}", path);
    Ok(())
}
