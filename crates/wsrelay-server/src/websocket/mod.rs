//! WebSocket transports
//!
//! Adapters that plug real sockets into the hub: accepted axum sockets for
//! clients, and a tokio-tungstenite dialer for the upstream peer.

pub mod connection;
pub mod upstream;

pub use connection::{AxumConnection, AxumReader, AxumWriter};
pub use upstream::{TungsteniteDialer, UpstreamConnection, UpstreamReader, UpstreamWriter};
