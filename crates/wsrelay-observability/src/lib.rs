//! wsrelay observability
//!
//! Structured logging setup and the health report served by the relay.

#![warn(missing_docs)]

pub mod error;
pub mod health;
pub mod logging;

pub use error::{ObservabilityError, Result};
pub use health::{HealthCheckResult, HealthResponse, HealthStatus};
pub use logging::LogManager;
