//! In-process transport
//!
//! Channel-backed connections for running the hub and bridge without a
//! network. A [`pair`] gives the relay side a [`MemoryConnection`] and the
//! test side a [`MemoryPeer`] that plays the remote end.

use std::io;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::connection::{Connection, Dialer, MessageReader, MessageWriter};
use crate::error::TransportError;
use crate::message::Message;

const DEFAULT_CAPACITY: usize = 64;

/// Relay side of an in-process connection
#[derive(Debug)]
pub struct MemoryConnection {
    reader: MemoryReader,
    writer: MemoryWriter,
}

#[derive(Debug)]
pub struct MemoryReader {
    rx: mpsc::Receiver<Message>,
}

#[derive(Debug)]
pub struct MemoryWriter {
    tx: Option<mpsc::Sender<Message>>,
}

/// Remote side of an in-process connection
#[derive(Debug)]
pub struct MemoryPeer {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
}

/// Create a connected pair with the default buffer size
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    pair_with_capacity(DEFAULT_CAPACITY)
}

/// Create a connected pair buffering at most `capacity` messages per direction
pub fn pair_with_capacity(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (to_relay, from_peer) = mpsc::channel(capacity);
    let (to_peer, from_relay) = mpsc::channel(capacity);

    let connection = MemoryConnection {
        reader: MemoryReader { rx: from_peer },
        writer: MemoryWriter { tx: Some(to_peer) },
    };
    let peer = MemoryPeer {
        tx: to_relay,
        rx: from_relay,
    };
    (connection, peer)
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl MessageReader for MemoryReader {
    async fn receive(&mut self) -> Result<Message, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl MessageWriter for MemoryWriter {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

impl MemoryPeer {
    /// Send a message to the relay. Fails once the relay dropped its reader.
    pub async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.tx.send(message).await.map_err(|_| TransportError::Closed)
    }

    /// Next message written by the relay, `None` once the relay closed its side
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Stop accepting messages. Further relay writes fail.
    pub fn stop_reading(&mut self) {
        self.rx.close();
    }

    /// Whether the relay side has dropped its reader
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the relay side has dropped its reader
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Drop the connection from the remote side
    pub fn hang_up(self) {}
}

type DialReply = oneshot::Sender<Result<MemoryConnection, TransportError>>;

/// Dialer whose attempts are answered by a [`DialControl`]
#[derive(Debug)]
pub struct MemoryDialer {
    attempts: mpsc::Sender<DialReply>,
}

/// Decides the outcome of each dial attempt, in order
#[derive(Debug)]
pub struct DialControl {
    attempts: mpsc::Receiver<DialReply>,
}

impl MemoryDialer {
    pub fn new() -> (Self, DialControl) {
        let (tx, rx) = mpsc::channel(1);
        (Self { attempts: tx }, DialControl { attempts: rx })
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    type Connection = MemoryConnection;

    async fn dial(&self) -> Result<MemoryConnection, TransportError> {
        let refused = || TransportError::Io(io::Error::from(io::ErrorKind::ConnectionRefused));

        let (reply, outcome) = oneshot::channel();
        self.attempts.send(reply).await.map_err(|_| refused())?;
        outcome.await.unwrap_or_else(|_| Err(refused()))
    }
}

impl DialControl {
    /// Wait for the next dial attempt and accept it
    ///
    /// Returns `None` once the dialer is gone.
    pub async fn connect(&mut self) -> Option<MemoryPeer> {
        self.connect_with_capacity(DEFAULT_CAPACITY).await
    }

    /// Like [`DialControl::connect`], with a custom buffer size
    pub async fn connect_with_capacity(&mut self, capacity: usize) -> Option<MemoryPeer> {
        loop {
            let reply = self.attempts.recv().await?;
            let (connection, peer) = pair_with_capacity(capacity);
            // an attempt abandoned by the dialer is skipped
            if reply.send(Ok(connection)).is_ok() {
                return Some(peer);
            }
        }
    }

    /// Wait for the next dial attempt and refuse it
    pub async fn refuse(&mut self) {
        if let Some(reply) = self.attempts.recv().await {
            let _ = reply.send(Err(TransportError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))));
        }
    }
}
