//! Error types for the room layer.

use guessroom_protocol::{ConnectionId, PlayerId, RoomId};
use guessroom_store::StoreError;

/// Errors that can occur during room operations.
///
/// Guard rejections ([`is_rejection`](Self::is_rejection)) never change
/// session state and never broadcast anything; only the requester hears
/// about them.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Only the host may start a round.
    #[error("player {0} is not the host of room {1}")]
    NotHost(PlayerId, RoomId),

    /// Too few players to start a round.
    #[error("room {room_id} needs {required} players to start, has {present}")]
    InsufficientPlayers {
        room_id: RoomId,
        required: usize,
        present: usize,
    },

    /// The player is not in this room.
    #[error("player {0} not in room {1}")]
    PlayerNotInRoom(PlayerId, RoomId),

    /// The action needs a running round.
    #[error("no round in progress in room {0}")]
    NotRunning(RoomId),

    /// The connection already speaks for another player in this room.
    #[error("{connection} already speaks for {player_id} in room {room_id}")]
    ConnectionBound {
        connection: ConnectionId,
        player_id: PlayerId,
        room_id: RoomId,
    },

    /// A player name was empty after trimming.
    #[error("player name must not be empty")]
    EmptyName,

    /// The connection has no player bound in this room.
    #[error("{0} is not bound to room {1}")]
    UnknownConnection(ConnectionId, RoomId),

    /// No live session for the room.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The persistence boundary failed (unknown player, outage).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session has stopped taking commands.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// Returns `true` for guard rejections (as opposed to failures).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotHost(..)
                | Self::InsufficientPlayers { .. }
                | Self::PlayerNotInRoom(..)
                | Self::NotRunning(_)
                | Self::ConnectionBound { .. }
                | Self::EmptyName
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_errors_are_rejections() {
        let room = RoomId(1);
        assert!(RoomError::NotHost(PlayerId(1), room).is_rejection());
        assert!(
            RoomError::InsufficientPlayers {
                room_id: room,
                required: 2,
                present: 1
            }
            .is_rejection()
        );
        assert!(RoomError::PlayerNotInRoom(PlayerId(1), room).is_rejection());
        assert!(RoomError::NotRunning(room).is_rejection());
        assert!(
            RoomError::ConnectionBound {
                connection: ConnectionId::new(3),
                player_id: PlayerId(1),
                room_id: room,
            }
            .is_rejection()
        );
        assert!(RoomError::EmptyName.is_rejection());
    }

    #[test]
    fn test_store_errors_are_failures() {
        let err: RoomError = StoreError::PlayerNotFound(PlayerId(4)).into();
        assert!(!err.is_rejection());
        assert_eq!(err.to_string(), "player P-4 not found");
    }

    #[test]
    fn test_insufficient_players_message() {
        let err = RoomError::InsufficientPlayers {
            room_id: RoomId(2),
            required: 2,
            present: 1,
        };
        assert_eq!(err.to_string(), "room R-2 needs 2 players to start, has 1");
    }
}
