//! Transport capability traits
//!
//! A connection is split into a reader and a writer so the inbound and
//! outbound loops of a session (or of the bridge) can run concurrently.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::Message;

/// Receiving half of a connection
#[async_trait]
pub trait MessageReader: Send + 'static {
    /// Wait for the next data message
    ///
    /// Returns [`TransportError::Closed`] once the peer has gone away.
    async fn receive(&mut self) -> Result<Message, TransportError>;
}

/// Sending half of a connection
#[async_trait]
pub trait MessageWriter: Send + 'static {
    async fn send(&mut self, message: Message) -> Result<(), TransportError>;

    /// Best-effort close handshake. Dropping both halves also closes the connection.
    async fn close(&mut self);
}

/// One live message connection
pub trait Connection: Send + 'static {
    type Reader: MessageReader;
    type Writer: MessageWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Opens connections to the upstream peer
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Connection: Connection;

    async fn dial(&self) -> Result<Self::Connection, TransportError>;
}
