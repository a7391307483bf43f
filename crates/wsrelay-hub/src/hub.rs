//! Hub control loop
//!
//! The hub is the single owner of the client registry. Registration,
//! deregistration and broadcast fan-out all arrive as events on its queues
//! and are handled one at a time by [`Hub::run`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use wsrelay_config::HubConfig;

use crate::connection::Connection;
use crate::error::HubError;
use crate::link::{BridgeStatus, UpstreamLink};
use crate::message::Message;
use crate::session::{self, SessionHandle, SessionId};

/// Registry counters published after every change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubStats {
    /// Sessions currently registered
    pub clients: usize,
    /// Sessions dropped because their outbound queue was full
    pub slow_client_drops: u64,
}

/// The control loop state. Build with [`Hub::new`] and drive with [`Hub::run`].
#[derive(Debug)]
pub struct Hub {
    registry: HashMap<SessionId, SessionHandle>,
    register_rx: mpsc::UnboundedReceiver<SessionHandle>,
    deregister_rx: mpsc::UnboundedReceiver<SessionId>,
    broadcast_rx: mpsc::Receiver<Message>,
    stats: watch::Sender<HubStats>,
    slow_client_drops: u64,
}

/// Cheap, clonable handle used by sessions, the bridge and the HTTP layer
#[derive(Debug, Clone)]
pub struct HubHandle {
    register_tx: mpsc::UnboundedSender<SessionHandle>,
    deregister_tx: mpsc::UnboundedSender<SessionId>,
    broadcast_tx: mpsc::Sender<Message>,
    link: Arc<UpstreamLink>,
    stats: watch::Receiver<HubStats>,
    client_queue_capacity: usize,
    upstream_queue_capacity: usize,
}

impl Hub {
    /// Create a hub and the handle used to talk to it
    ///
    /// Zero capacities are raised to one.
    pub fn new(config: &HubConfig) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (deregister_tx, deregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue_capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(HubStats::default());

        let hub = Self {
            registry: HashMap::new(),
            register_rx,
            deregister_rx,
            broadcast_rx,
            stats: stats_tx,
            slow_client_drops: 0,
        };

        let handle = HubHandle {
            register_tx,
            deregister_tx,
            broadcast_tx,
            link: Arc::new(UpstreamLink::new()),
            stats: stats_rx,
            client_queue_capacity: config.client_queue_capacity.max(1),
            upstream_queue_capacity: config.upstream_queue_capacity.max(1),
        };

        (hub, handle)
    }

    /// Run the control loop
    ///
    /// Returns once every [`HubHandle`] is dropped. The upstream bridge holds
    /// one, so in the server the hub and bridge run for the life of the process.
    pub async fn run(mut self) {
        info!("Hub started");
        loop {
            // register before deregister, so a session's own deregistration
            // can never be processed ahead of its registration
            tokio::select! {
                biased;
                Some(session) = self.register_rx.recv() => self.register(session),
                Some(id) = self.deregister_rx.recv() => {
                    self.deregister(id);
                }
                Some(message) = self.broadcast_rx.recv() => self.broadcast(message),
                else => break,
            }
        }
        info!("Hub stopped");
    }

    fn register(&mut self, session: SessionHandle) {
        let id = session.id();
        self.registry.insert(id, session);
        info!(session_id = id.as_u64(), "Client connected");
        self.publish_stats();
    }

    /// Returns whether the session was still registered
    fn deregister(&mut self, id: SessionId) -> bool {
        // dropping the handle closes the outbound queue and the connection
        match self.registry.remove(&id) {
            Some(_session) => {
                info!(session_id = id.as_u64(), "Client disconnected");
                self.publish_stats();
                true
            }
            None => false,
        }
    }

    fn broadcast(&mut self, message: Message) {
        let mut lagging = Vec::new();

        for (id, session) in &self.registry {
            match session.try_deliver(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    info!(session_id = id.as_u64(), "Client cannot keep up, dropping it");
                    self.slow_client_drops += 1;
                    lagging.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session_id = id.as_u64(), "Outbound loop already gone");
                    lagging.push(*id);
                }
            }
        }

        // removed after the pass, within this same iteration of the loop
        for id in lagging {
            self.deregister(id);
        }
    }

    fn publish_stats(&self) {
        self.stats.send_replace(HubStats {
            clients: self.registry.len(),
            slow_client_drops: self.slow_client_drops,
        });
    }
}

impl HubHandle {
    /// Register a session for an accepted connection and start its loops
    pub fn attach<C: Connection>(&self, connection: C) -> SessionId {
        session::spawn(self, connection)
    }

    pub(crate) fn register(&self, session: SessionHandle) {
        // on a stopped hub the handle is dropped here, which closes the session
        let _ = self.register_tx.send(session);
    }

    /// Ask the hub to drop a session. Unknown or already removed sessions are ignored.
    pub fn deregister(&self, id: SessionId) {
        let _ = self.deregister_tx.send(id);
    }

    /// Queue an upstream message for fan-out to every client
    pub async fn broadcast_from_upstream(&self, message: Message) -> Result<(), HubError> {
        self.broadcast_tx
            .send(message)
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Forward a client message to the current upstream connection
    ///
    /// Returns `false` when the message was dropped because no upstream
    /// connection is established. Nothing is buffered across reconnects.
    pub async fn relay_to_upstream(&self, message: Message) -> bool {
        let Some(upstream) = self.link.snapshot() else {
            debug!("Upstream not connected, dropping client message");
            return false;
        };
        upstream.send(message).await.is_ok()
    }

    pub fn upstream_status(&self) -> BridgeStatus {
        self.link.status()
    }

    /// Watch upstream status transitions
    pub fn subscribe_upstream_status(&self) -> watch::Receiver<BridgeStatus> {
        self.link.subscribe()
    }

    pub fn upstream_link(&self) -> &Arc<UpstreamLink> {
        &self.link
    }

    pub fn stats(&self) -> HubStats {
        *self.stats.borrow()
    }

    /// Watch registry counters
    pub fn subscribe_stats(&self) -> watch::Receiver<HubStats> {
        self.stats.clone()
    }

    /// Whether the control loop has stopped
    pub fn is_closed(&self) -> bool {
        self.broadcast_tx.is_closed()
    }

    pub(crate) fn client_queue_capacity(&self) -> usize {
        self.client_queue_capacity
    }

    pub(crate) fn upstream_queue_capacity(&self) -> usize {
        self.upstream_queue_capacity
    }
}
