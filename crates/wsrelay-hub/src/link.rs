//! Versioned cell holding the current upstream connection

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use crate::message::Message;

/// Upstream bridge lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl BridgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStatus::Disconnected => "disconnected",
            BridgeStatus::Connecting => "connecting",
            BridgeStatus::Connected => "connected",
        }
    }
}

impl std::fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Link {
    generation: u64,
    sender: mpsc::Sender<Message>,
}

/// The bridge's current connection, as seen by everyone else
///
/// Only the bridge task installs and clears links. Readers take a snapshot
/// of the sender; the lock is never held across an await.
#[derive(Debug)]
pub struct UpstreamLink {
    current: RwLock<Option<Link>>,
    status: watch::Sender<BridgeStatus>,
}

impl Default for UpstreamLink {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamLink {
    pub fn new() -> Self {
        let (status, _) = watch::channel(BridgeStatus::Disconnected);
        Self {
            current: RwLock::new(None),
            status,
        }
    }

    /// Sender for the current upstream connection, if one is established
    pub fn snapshot(&self) -> Option<mpsc::Sender<Message>> {
        self.current.read().as_ref().map(|link| link.sender.clone())
    }

    /// Generation of the installed connection
    pub fn generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|link| link.generation)
    }

    pub fn status(&self) -> BridgeStatus {
        *self.status.borrow()
    }

    /// Watch status transitions
    pub fn subscribe(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    pub(crate) fn set_status(&self, status: BridgeStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn install(&self, generation: u64, sender: mpsc::Sender<Message>) {
        *self.current.write() = Some(Link { generation, sender });
        self.set_status(BridgeStatus::Connected);
    }

    /// Drop the link if it still belongs to `generation`
    ///
    /// New relays fail to take a snapshot from here on; whatever is still
    /// queued dies with the connection's receiver and is never replayed.
    pub(crate) fn clear(&self, generation: u64) -> bool {
        let mut current = self.current.write();
        let owned = current
            .as_ref()
            .is_some_and(|link| link.generation == generation);
        if owned {
            *current = None;
            drop(current);
            self.set_status(BridgeStatus::Disconnected);
        }
        owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_and_clear() {
        let link = UpstreamLink::new();
        assert_eq!(link.status(), BridgeStatus::Disconnected);
        assert!(link.snapshot().is_none());

        let (tx, _rx) = mpsc::channel(4);
        link.install(1, tx);
        assert_eq!(link.status(), BridgeStatus::Connected);
        assert_eq!(link.generation(), Some(1));
        assert!(link.snapshot().is_some());

        assert!(!link.clear(2));
        assert_eq!(link.status(), BridgeStatus::Connected);

        assert!(link.clear(1));
        assert_eq!(link.status(), BridgeStatus::Disconnected);
        assert!(link.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_fails_after_connection_ends() {
        let link = UpstreamLink::new();
        let (tx, rx) = mpsc::channel(4);
        link.install(7, tx);

        let stale = link.snapshot().unwrap();
        link.clear(7);
        drop(rx);

        assert!(stale.send(Message::text("late")).await.is_err());
        assert!(link.snapshot().is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BridgeStatus::Connecting.to_string(), "connecting");
    }
}
