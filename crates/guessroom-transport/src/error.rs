use std::net::SocketAddr;

use guessroom_protocol::ConnectionId;
use tokio_tungstenite::tungstenite;

/// Errors raised while accepting or talking to a client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The TCP connection came in but never became a WebSocket.
    #[error("websocket handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: Box<tungstenite::Error>,
    },

    /// Clients parse text frames, so outbound bytes must be UTF-8.
    #[error("outbound frame is not UTF-8: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("socket error on connection {connection}: {source}")]
    Socket {
        connection: ConnectionId,
        #[source]
        source: Box<tungstenite::Error>,
    },
}

impl TransportError {
    /// Classifies a socket error on `connection`.
    pub(crate) fn socket(connection: ConnectionId, err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed(connection)
            }
            other => Self::Socket {
                connection,
                source: Box::new(other),
            },
        }
    }
}
