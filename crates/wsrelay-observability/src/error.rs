//! Observability errors

/// Observability errors
#[derive(Debug, thiserror::Error, Clone)]
pub enum ObservabilityError {
    /// Logging setup failed
    #[error("Logging error: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// Subscriber initialization failed
    #[error("Initialization error: {message}")]
    Init {
        /// Error message
        message: String,
    },
}

impl ObservabilityError {
    /// Create a logging error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Create an initialization error
    pub fn init(message: impl Into<String>) -> Self {
        Self::Init {
            message: message.into(),
        }
    }
}

/// Result alias for this crate
pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ObservabilityError::logging("bad directive");
        assert!(matches!(err, ObservabilityError::Logging { .. }));
        assert_eq!(err.to_string(), "Logging error: bad directive");

        let err = ObservabilityError::init("twice");
        assert!(matches!(err, ObservabilityError::Init { .. }));
        assert_eq!(err.to_string(), "Initialization error: twice");
    }
}
