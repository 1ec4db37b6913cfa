//! WebSocket links over `tokio-tungstenite`.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::{ConnectionId, FrameReader, FrameWriter, Link, Transport, TransportError};

type Socket = WebSocketStream<TcpStream>;

/// A link accepted by [`WebSocketTransport`].
pub type WebSocketLink = Link<WebSocketReader, WebSocketWriter>;

/// Listens for browser clients.
///
/// Connection ids are handed out in accept order, starting at 1.
pub struct WebSocketTransport {
    listener: TcpListener,
    next_id: u64,
}

impl WebSocketTransport {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "listening for websocket clients");
        Ok(Self {
            listener,
            next_id: 1,
        })
    }

    fn allocate_id(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Transport for WebSocketTransport {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    async fn accept(&mut self) -> Result<WebSocketLink, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        let socket = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| TransportError::Handshake {
                peer,
                source: Box::new(e),
            })?;

        let id = self.allocate_id();
        tracing::debug!(%id, %peer, "client connected");

        let (sink, stream) = socket.split();
        Ok(Link {
            id,
            peer,
            reader: WebSocketReader { id, stream },
            writer: WebSocketWriter { id, sink },
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Inbound frames from one client. Text and binary frames are both accepted.
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<Socket>,
}

impl FrameReader for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message.map_err(|e| TransportError::socket(self.id, e))? {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => return Ok(None),
                // Pings are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }
}

/// Outbound frames to one client, always sent as text.
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<Socket, Message>,
}

impl FrameWriter for WebSocketWriter {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let text = std::str::from_utf8(frame)?;
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::socket(self.id, e))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::socket(self.id, e))
    }
}
