//! Error types for the store layer.

use guessroom_protocol::{PlayerId, RoomId};

/// Errors returned at the persistence boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No player record with this id.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// No membership record for this player in this room.
    #[error("player {0} has no membership in room {1}")]
    MembershipNotFound(PlayerId, RoomId),

    /// The backing store could not serve the request right now.
    /// Retrying is the caller's decision.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
