//! Upstream bridge
//!
//! Keeps exactly one connection to the upstream server alive for the life of
//! the process, reconnecting after a fixed delay whenever it drops.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};

use crate::connection::{Connection, Dialer, MessageReader, MessageWriter};
use crate::error::TransportError;
use crate::hub::HubHandle;
use crate::link::BridgeStatus;
use crate::message::Message;
use crate::session::CLOSE_GRACE;

/// Why a connection's pumps stopped
#[derive(Debug)]
enum PumpExit {
    Disconnected(TransportError),
    HubClosed,
}

/// Drives the upstream connection: Disconnected, Connecting, Connected, repeat
pub struct UpstreamBridge<D: Dialer> {
    dialer: D,
    hub: HubHandle,
    retry_delay: Duration,
    generation: u64,
}

impl<D: Dialer> UpstreamBridge<D> {
    pub fn new(dialer: D, hub: HubHandle, retry_delay: Duration) -> Self {
        Self {
            dialer,
            hub,
            retry_delay,
            generation: 0,
        }
    }

    /// Keep an upstream connection up. Dial failures and disconnects are retried forever.
    ///
    /// Returns once the hub loop has stopped. The bridge holds a [`HubHandle`],
    /// which keeps the hub running, so in the server both run for the life of
    /// the process.
    pub async fn run(mut self) {
        let link = self.hub.upstream_link().clone();

        while !self.hub.is_closed() {
            link.set_status(BridgeStatus::Connecting);

            match self.dialer.dial().await {
                Ok(connection) => {
                    self.generation += 1;
                    let generation = self.generation;
                    let span = info_span!("upstream", generation);
                    let exit = self.serve(connection).instrument(span).await;
                    if matches!(exit, PumpExit::HubClosed) {
                        break;
                    }
                }
                Err(e) => {
                    link.set_status(BridgeStatus::Disconnected);
                    warn!("Failed to connect upstream: {}", e);
                }
            }

            info!(
                "Reconnecting to upstream in {}s",
                self.retry_delay.as_secs_f32()
            );
            tokio::time::sleep(self.retry_delay).await;
        }

        link.set_status(BridgeStatus::Disconnected);
        info!("Upstream bridge stopped");
    }

    async fn serve(&self, connection: D::Connection) -> PumpExit {
        let link = self.hub.upstream_link();
        let generation = self.generation;

        // a fresh queue per connection; anything left in it dies with `rx`
        let (tx, rx) = mpsc::channel(self.hub.upstream_queue_capacity());
        let (reader, mut writer) = connection.split();
        link.install(generation, tx);
        info!("Connected to upstream");

        let exit = tokio::select! {
            exit = pump_inbound(reader, &self.hub) => exit,
            exit = pump_outbound(&mut writer, rx) => exit,
        };

        link.clear(generation);
        let _ = tokio::time::timeout(CLOSE_GRACE, writer.close()).await;

        match &exit {
            PumpExit::Disconnected(TransportError::Closed) => {
                info!("Upstream closed the connection")
            }
            PumpExit::Disconnected(e) => warn!("Upstream connection lost: {}", e),
            PumpExit::HubClosed => info!("Hub stopped, closing upstream"),
        }
        exit
    }
}

async fn pump_inbound<R: MessageReader>(mut reader: R, hub: &HubHandle) -> PumpExit {
    loop {
        match reader.receive().await {
            Ok(message) => {
                if hub.broadcast_from_upstream(message).await.is_err() {
                    return PumpExit::HubClosed;
                }
            }
            Err(e) => return PumpExit::Disconnected(e),
        }
    }
}

async fn pump_outbound<W: MessageWriter>(
    writer: &mut W,
    mut rx: mpsc::Receiver<Message>,
) -> PumpExit {
    while let Some(message) = rx.recv().await {
        if let Err(e) = writer.send(message).await {
            return PumpExit::Disconnected(e);
        }
    }
    PumpExit::Disconnected(TransportError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use crate::memory::MemoryDialer;
    use wsrelay_config::HubConfig;

    #[tokio::test(start_paused = true)]
    async fn test_refused_dial_is_retried() {
        let (hub, handle) = Hub::new(&HubConfig::default());
        tokio::spawn(hub.run());

        let (dialer, mut control) = MemoryDialer::new();
        let bridge = UpstreamBridge::new(dialer, handle.clone(), Duration::from_secs(5));
        let running = tokio::spawn(bridge.run());

        control.refuse().await;
        let started = tokio::time::Instant::now();
        let _peer = control.connect().await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited <= Duration::from_secs(5) + Duration::from_millis(100));

        let mut status = handle.subscribe_upstream_status();
        status
            .wait_for(|s| *s == BridgeStatus::Connected)
            .await
            .unwrap();
        assert_eq!(handle.upstream_link().generation(), Some(1));

        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_connection_gets_a_new_generation() {
        let (hub, handle) = Hub::new(&HubConfig::default());
        tokio::spawn(hub.run());

        let (dialer, mut control) = MemoryDialer::new();
        let bridge = UpstreamBridge::new(dialer, handle.clone(), Duration::from_secs(1));
        let running = tokio::spawn(bridge.run());

        let first = control.connect().await.unwrap();
        let mut status = handle.subscribe_upstream_status();
        status
            .wait_for(|s| *s == BridgeStatus::Connected)
            .await
            .unwrap();
        let lost_at = tokio::time::Instant::now();
        first.hang_up();

        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| *s == BridgeStatus::Connecting),
        )
        .await
        .expect("bridge never went back to connecting")
        .unwrap();
        let waited = lost_at.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited <= Duration::from_secs(1) + Duration::from_millis(100));

        let _second = control.connect().await.unwrap();
        status
            .wait_for(|s| *s == BridgeStatus::Connected)
            .await
            .unwrap();
        assert_eq!(handle.upstream_link().generation(), Some(2));

        running.abort();
    }
}
