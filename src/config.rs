//! Layered configuration: defaults, global file, environment overlay.

use crate::error::ToolError;
use crate::logging::LoggingConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store backend settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory of the sled database; None means the platform data
    /// directory default.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreSettings {
    /// Resolve the database directory: explicit setting, else platform
    /// default.
    pub fn resolve_path(&self) -> Result<PathBuf, ToolError> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => default_store_path(),
        }
    }
}

/// Platform-default store directory (data dir of the rehome project).
pub fn default_store_path() -> Result<PathBuf, ToolError> {
    let dirs = directories::ProjectDirs::from("", "rehome", "rehome").ok_or_else(|| {
        ToolError::Config("Could not determine platform data directory for the store".to_string())
    })?;
    Ok(dirs.data_dir().join("store"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RehomeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreSettings,
}

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the standard sources. Precedence, lowest first: built-in
    /// defaults, the global config file, then the REHOME_* environment
    /// overlay with `__` separating nested keys.
    pub fn load() -> Result<RehomeConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = global_config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        let builder = builder.add_source(
            Environment::with_prefix("REHOME")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    /// Load a specific file, still applying the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<RehomeConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.to_path_buf()))
            .add_source(
                Environment::with_prefix("REHOME")
                    .separator("__")
                    .try_parsing(true),
            );
        builder.build()?.try_deserialize()
    }
}

/// Global config file (config dir of the rehome project), if resolvable.
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "rehome", "rehome")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
