//! Structured logging
//!
//! Installs the global `tracing` subscriber and keeps a handle for changing the filter at runtime.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing_subscriber::{
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};
use wsrelay_config::LoggingConfig;

use crate::error::{ObservabilityError, Result};

type ReloadHandle = Handle<EnvFilter, Registry>;

/// Owns the reload handle of the installed subscriber
#[derive(Debug)]
pub struct LogManager {
    /// Config the subscriber was built from
    config: LoggingConfig,

    /// Filter reload handle
    reload_handle: Arc<RwLock<ReloadHandle>>,
}

impl LogManager {
    /// Install the global subscriber
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init(config: &LoggingConfig) -> Result<Self> {
        let filter = build_filter(config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let registry = tracing_subscriber::registry().with(filter);

        let installed = if config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_line_number(true)
                .with_file(true);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::init(e.to_string()))?;

        tracing::info!(
            target: "wsrelay_observability",
            "Log manager initialized with level: {}",
            config.level
        );

        Ok(Self {
            config: config.clone(),
            reload_handle: Arc::new(RwLock::new(reload_handle)),
        })
    }

    /// Replace the active filter with `level` (any `EnvFilter` directive)
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let new_filter = EnvFilter::try_new(level)
            .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

        self.reload_handle
            .write()
            .modify(|filter| {
                *filter = new_filter;
            })
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        self.config.level = level
            .parse()
            .unwrap_or(self.config.level);

        tracing::info!(
            target: "wsrelay_observability",
            "Log level updated to: {}",
            level
        );

        Ok(())
    }

    /// Current logging config
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }
}

/// Build an `EnvFilter` from the level plus per-module directives
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(config.level.as_str())
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    // module overrides
    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}
