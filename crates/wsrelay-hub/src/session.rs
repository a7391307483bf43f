//! Client sessions
//!
//! A session adapts one downstream connection into the two directions of the
//! relay: an inbound loop feeding the upstream queue and an outbound loop
//! draining the session's bounded queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::connection::{Connection, MessageReader, MessageWriter};
use crate::error::TransportError;
use crate::hub::HubHandle;
use crate::message::Message;

/// How long a close handshake may take before the connection is just dropped
pub(crate) const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Process-unique session identity, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The hub's side of a session: what the registry owns
///
/// The registry entry holds the only sender of the outbound queue. Dropping
/// the handle closes that queue and closes the connection.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    id: SessionId,
    outbound: mpsc::Sender<Message>,
    closed: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: SessionId::next(),
            outbound,
            closed: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    /// Signal observed by both session loops once the hub lets go
    pub(crate) fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Non-blocking enqueue onto the outbound queue
    pub(crate) fn try_deliver(
        &self,
        message: Message,
    ) -> Result<(), mpsc::error::TrySendError<Message>> {
        self.outbound.try_send(message)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Register a new session for `connection` and start its loops
pub(crate) fn spawn<C: Connection>(hub: &HubHandle, connection: C) -> SessionId {
    let (handle, outbound) = SessionHandle::new(hub.client_queue_capacity());
    let id = handle.id();
    let closed = handle.close_signal();

    // registration is queued before either loop can ask for deregistration
    hub.register(handle);

    let (reader, writer) = connection.split();
    let span = info_span!("session", session_id = id.as_u64());
    tokio::spawn(run_inbound(hub.clone(), id, reader, closed.clone()).instrument(span.clone()));
    tokio::spawn(run_outbound(hub.clone(), id, writer, outbound, closed).instrument(span));
    id
}

/// Sends `Deregister` when the inbound loop ends, however it ends
struct DeregisterOnDrop {
    hub: HubHandle,
    id: SessionId,
}

impl Drop for DeregisterOnDrop {
    fn drop(&mut self) {
        self.hub.deregister(self.id);
    }
}

async fn run_inbound<R: MessageReader>(
    hub: HubHandle,
    id: SessionId,
    mut reader: R,
    closed: CancellationToken,
) {
    let _deregister = DeregisterOnDrop {
        hub: hub.clone(),
        id,
    };

    loop {
        let received = tokio::select! {
            _ = closed.cancelled() => break,
            received = reader.receive() => received,
        };

        match received {
            Ok(message) => {
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = hub.relay_to_upstream(message) => {}
                }
            }
            Err(TransportError::Closed) => {
                debug!("Client closed the connection");
                break;
            }
            Err(e) => {
                warn!("Client read error: {}", e);
                break;
            }
        }
    }
}

async fn run_outbound<W: MessageWriter>(
    hub: HubHandle,
    id: SessionId,
    mut writer: W,
    mut outbound: mpsc::Receiver<Message>,
    closed: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let sent = tokio::select! {
            _ = closed.cancelled() => break,
            sent = writer.send(message) => sent,
        };

        if let Err(e) = sent {
            warn!("Client write error: {}", e);
            hub.deregister(id);
            return;
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE, writer.close()).await;
    debug!("Session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(a.to_string(), format!("session-{}", a.as_u64()));
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_queue_and_signal() {
        let (handle, mut outbound) = SessionHandle::new(2);
        let closed = handle.close_signal();

        handle.try_deliver(Message::text("one")).unwrap();
        drop(handle);

        assert!(closed.is_cancelled());
        assert_eq!(outbound.recv().await, Some(Message::text("one")));
        assert_eq!(outbound.recv().await, None);
    }

    #[test]
    fn test_full_queue_is_reported() {
        let (handle, _outbound) = SessionHandle::new(1);
        handle.try_deliver(Message::text("a")).unwrap();
        assert!(matches!(
            handle.try_deliver(Message::text("b")),
            Err(mpsc::error::TrySendError::Full(_))
        ));
    }
}
