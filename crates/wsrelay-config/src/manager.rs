use crate::config::{Config, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Loads and holds the relay configuration
///
/// Loads the optional JSON config file once at startup. A missing file means
/// built-in defaults; nothing is ever written back.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config file at `path`, falling back to defaults when it does not exist
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file {:?} not found, using defaults", path);
            Config::default()
        };

        config.validate()?;

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Load from the default location (~/.wsrelay/config.json)
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = crate::default_config_path().ok_or_else(|| {
            ConfigError::InvalidPath("Could not find home directory".to_string())
        })?;
        Self::load(&config_path).await
    }

    /// Wrap an already built config
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { path, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Path the config was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}
