//! Unified error type for the guessroom server.

use guessroom_protocol::ProtocolError;
use guessroom_room::RoomError;
use guessroom_store::StoreError;
use guessroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GuessroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A persistence error outside any room (player registration).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room-level error (guard rejection, unknown room).
    #[error(transparent)]
    Room(#[from] RoomError),
}
