//! Error types shared by sessions and the bridge

/// A read or write failure on one connection
///
/// Always local to the session or bridge that owns the connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wrap a transport-specific error (tungstenite, axum, ...)
    pub fn protocol<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Protocol(Box::new(err))
    }
}

/// Hub-related errors
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub is no longer running")]
    Closed,
}
