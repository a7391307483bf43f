//! Health report
//!
//! Types behind the relay's `/health` endpoint.

use std::time::Instant;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Health of one check or of the whole relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully working
    #[default]
    Healthy,
    /// Working with reduced function
    Degraded,
    /// Not working
    Unhealthy,
}

impl HealthStatus {
    /// HTTP status code for this state
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK, // still serving
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the relay is still serving
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Result of one named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Check name
    pub name: String,
    /// Status
    pub status: HealthStatus,
    /// Optional detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Extra data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl HealthCheckResult {
    /// Create a check result
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            message: None,
            metadata: None,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Body of the `/health` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status among the checks
    pub status: HealthStatus,
    /// Application name
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// RFC 3339 time of the report
    pub timestamp: String,
    /// Individual check results
    pub checks: Vec<HealthCheckResult>,
}

impl HealthResponse {
    /// Build a report whose overall status is the worst of its checks
    pub fn from_checks(
        app_name: impl Into<String>,
        version: impl Into<String>,
        started_at: Instant,
        checks: Vec<HealthCheckResult>,
    ) -> Self {
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or_default();

        Self {
            status,
            app_name: app_name.into(),
            version: version.into(),
            uptime_seconds: started_at.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HealthStatus::Healthy.to_status_code(), StatusCode::OK);
        assert_eq!(HealthStatus::Degraded.to_status_code(), StatusCode::OK);
        assert_eq!(
            HealthStatus::Unhealthy.to_status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(HealthStatus::Degraded.is_healthy());
        assert!(!HealthStatus::Unhealthy.is_healthy());
    }

    #[test]
    fn test_overall_status_is_worst_check() {
        let checks = vec![
            HealthCheckResult::new("clients", HealthStatus::Healthy),
            HealthCheckResult::new("upstream", HealthStatus::Degraded)
                .with_message("connecting"),
        ];
        let report = HealthResponse::from_checks("wsrelay", "0.1.0", Instant::now(), checks);
        assert_eq!(report.status, HealthStatus::Degraded);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["checks"][1]["message"], "connecting");
        assert!(json["checks"][0].get("message").is_none());
    }

    #[test]
    fn test_empty_report_is_healthy() {
        let report = HealthResponse::from_checks("wsrelay", "0.1.0", Instant::now(), Vec::new());
        assert_eq!(report.status, HealthStatus::Healthy);
    }
}
