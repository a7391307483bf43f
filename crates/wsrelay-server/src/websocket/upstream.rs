//! Upstream connections dialed with tokio-tungstenite

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use wsrelay_hub::{
    Connection, Dialer, Message, MessageKind, MessageReader, MessageWriter, TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the configured upstream URL (`ws://` or `wss://`)
#[derive(Debug, Clone)]
pub struct TungsteniteDialer {
    url: String,
}

impl TungsteniteDialer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    type Connection = UpstreamConnection;

    async fn dial(&self) -> Result<UpstreamConnection, TransportError> {
        debug!(url = %self.url, "Dialing upstream");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(transport_error)?;
        Ok(UpstreamConnection { stream })
    }
}

/// An established upstream WebSocket
pub struct UpstreamConnection {
    stream: WsStream,
}

pub struct UpstreamReader {
    stream: SplitStream<WsStream>,
}

pub struct UpstreamWriter {
    sink: SplitSink<WsStream, WsMessage>,
}

impl Connection for UpstreamConnection {
    type Reader = UpstreamReader;
    type Writer = UpstreamWriter;

    fn split(self) -> (UpstreamReader, UpstreamWriter) {
        let (sink, stream) = self.stream.split();
        (UpstreamReader { stream }, UpstreamWriter { sink })
    }
}

#[async_trait]
impl MessageReader for UpstreamReader {
    async fn receive(&mut self) -> Result<Message, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Message::text(text)),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Message::binary(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                    continue
                }
                Some(Err(e)) => return Err(transport_error(e)),
            }
        }
    }
}

#[async_trait]
impl MessageWriter for UpstreamWriter {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        let frame = match (message.kind(), message.as_text()) {
            (MessageKind::Text, Some(text)) => WsMessage::Text(text.to_owned()),
            _ => WsMessage::Binary(message.payload().to_vec()),
        };
        self.sink.send(frame).await.map_err(transport_error)
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

fn transport_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        tungstenite::Error::Io(e) => TransportError::Io(e),
        other => TransportError::protocol(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            transport_error(tungstenite::Error::ConnectionClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            transport_error(tungstenite::Error::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused
            ))),
            TransportError::Io(_)
        ));
        assert!(matches!(
            transport_error(tungstenite::Error::Utf8),
            TransportError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn test_dial_refused_is_io_error() {
        // bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dialer = TungsteniteDialer::new(format!("ws://{addr}"));
        assert!(dialer.dial().await.is_err());
    }
}
