//! Accepted client sockets

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use wsrelay_hub::{Connection, Message, MessageKind, MessageReader, MessageWriter, TransportError};

/// A client socket accepted through axum's upgrade
pub struct AxumConnection {
    socket: WebSocket,
}

impl AxumConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

pub struct AxumReader {
    stream: SplitStream<WebSocket>,
}

pub struct AxumWriter {
    sink: SplitSink<WebSocket, WsMessage>,
}

impl Connection for AxumConnection {
    type Reader = AxumReader;
    type Writer = AxumWriter;

    fn split(self) -> (AxumReader, AxumWriter) {
        let (sink, stream) = self.socket.split();
        (AxumReader { stream }, AxumWriter { sink })
    }
}

#[async_trait]
impl MessageReader for AxumReader {
    async fn receive(&mut self) -> Result<Message, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Message::text(text)),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Message::binary(data)),
                Some(Ok(WsMessage::Close(_))) | None => return Err(TransportError::Closed),
                // pings are answered by the socket itself
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                Some(Err(e)) => return Err(TransportError::protocol(e)),
            }
        }
    }
}

#[async_trait]
impl MessageWriter for AxumWriter {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.sink
            .send(to_ws(&message))
            .await
            .map_err(TransportError::protocol)
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

fn to_ws(message: &Message) -> WsMessage {
    match (message.kind(), message.as_text()) {
        (MessageKind::Text, Some(text)) => WsMessage::Text(text.to_owned()),
        _ => WsMessage::Binary(message.payload().to_vec()),
    }
}
