//! Stored records: the data structures behind players and room memberships.

use chrono::{DateTime, Utc};
use guessroom_protocol::{PlayerId, RoomId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A registered player.
///
/// `score` is cumulative and never negative. Only the score ledger in the
/// room layer changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u64,
    pub is_ready: bool,
}

impl Player {
    /// A fresh player with a zero score.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
            is_ready: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomMembership
// ---------------------------------------------------------------------------

/// One player's seat in one room.
///
/// Host succession follows `join_seq`, a strictly increasing per-room
/// counter. `joined_at` is informational only; wall clocks can step back.
/// Within a non-empty room exactly one membership has `is_host` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub is_host: bool,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
    pub join_seq: u64,
}

impl RoomMembership {
    /// A new, non-host membership stamped with the current time.
    pub fn new(room_id: RoomId, player_id: PlayerId, join_seq: u64) -> Self {
        Self {
            room_id,
            player_id,
            is_host: false,
            is_ready: false,
            joined_at: Utc::now(),
            join_seq,
        }
    }

    /// Sort key for succession: earlier joiners first.
    pub fn join_order(&self) -> u64 {
        self.join_seq
    }
}
