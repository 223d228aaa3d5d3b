use crate::domain::{
    config::SerialTermConfig,
    error::{SerialTermError, SerialTermResult},
};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Settings are only ever read; nothing is written back between runs.
pub struct ConfigManager {
    global_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        Self {
            global_config_path: Self::get_global_config_path(),
        }
    }

    /// Load configuration from the user's config file, or defaults
    pub fn load_config(&self) -> SerialTermResult<SerialTermConfig> {
        match &self.global_config_path {
            Some(path) if path.exists() => self.load_config_from_path(path),
            _ => Ok(SerialTermConfig::default()),
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> SerialTermResult<SerialTermConfig> {
        let content = fs::read_to_string(path).map_err(|e| SerialTermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| SerialTermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Get the global config path
    pub fn global_config_path(&self) -> Option<&Path> {
        self.global_config_path.as_deref()
    }

    fn get_global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("serialterm").join("config.toml"))
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
