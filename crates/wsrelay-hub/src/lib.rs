//! wsrelay hub - connection hub and upstream bridge
//!
//! This crate owns the relay's moving parts: the [`Hub`] control loop that
//! holds every client session, the per-client session loops, and the
//! [`UpstreamBridge`] that keeps one upstream connection alive. Transports
//! plug in through the [`Connection`] and [`Dialer`] traits.

mod bridge;
mod connection;
mod error;
mod hub;
mod link;
pub mod memory;
mod message;
mod session;

pub use bridge::UpstreamBridge;
pub use connection::{Connection, Dialer, MessageReader, MessageWriter};
pub use error::{HubError, TransportError};
pub use hub::{Hub, HubHandle, HubStats};
pub use link::{BridgeStatus, UpstreamLink};
pub use message::{Message, MessageKind};
pub use session::SessionId;
pub use wsrelay_config::HubConfig;
