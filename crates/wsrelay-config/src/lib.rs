pub mod config;
pub mod manager;

pub use config::{
    Config, ConfigError, ConfigResult, HubConfig, LogLevel, LoggingConfig, ServerConfig,
    UpstreamConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// The wsrelay directory, `~/.wsrelay`
pub fn wsrelay_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wsrelay"))
}

/// Default config file path
pub fn default_config_path() -> Option<PathBuf> {
    wsrelay_dir().map(|dir| dir.join("config.json"))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(rest))
    } else {
        Some(PathBuf::from(path))
    }
}
