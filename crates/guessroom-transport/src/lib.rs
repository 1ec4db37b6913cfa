//! Client links for guessroom.
//!
//! The server needs two things from the network: new clients, and a way to
//! move frames to and from each of them. A [`Transport`] hands out one
//! [`Link`] per client. A link is already split into a [`FrameReader`] and a
//! [`FrameWriter`], so a handler can wait on the socket and push room events
//! at the same time without locking.
//!
//! [`WebSocketTransport`] is the browser-facing implementation.

#![allow(async_fn_in_trait)]

use std::net::SocketAddr;

mod error;
mod websocket;

pub use error::TransportError;
pub use guessroom_protocol::ConnectionId;
pub use websocket::{WebSocketLink, WebSocketReader, WebSocketTransport, WebSocketWriter};

/// Source of new client links.
pub trait Transport: Send + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    /// Waits for the next client and completes its handshake.
    async fn accept(&mut self) -> Result<Link<Self::Reader, Self::Writer>, TransportError>;

    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// The inbound half of a link.
pub trait FrameReader: Send + 'static {
    /// The next frame's payload. `Ok(None)` once the client closed cleanly.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// The outbound half of a link.
pub trait FrameWriter: Send + 'static {
    /// Sends one frame.
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// One accepted client.
#[derive(Debug)]
pub struct Link<R, W> {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub reader: R,
    pub writer: W,
}
