//! Core protocol types for guessroom's wire format.
//!
//! Everything in this module travels "on the wire": client requests come in,
//! room events and acknowledgments go out. JSON field names are camelCase to
//! match the browser clients.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype wrapper over `u64` so a `PlayerId` can never be passed where a
/// `RoomId` is expected. `#[serde(transparent)]` keeps the JSON a plain
/// number: `PlayerId(42)` is just `42`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Opaque identifier for a transport connection.
///
/// Only ever used as a delivery address. Game state (host, roster, scores)
/// is keyed by [`PlayerId`], never by connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Scope: who should receive an event?
// ---------------------------------------------------------------------------

/// Delivery scope of an outbound event.
///
/// The session state machine tags every event it emits with a scope; the
/// broadcast router turns the scope into concrete connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Every connection currently joined to the room.
    Room,

    /// A single connection (the requester, or a connection that just joined).
    Connection(ConnectionId),

    /// Every connection on the server, whatever room it is in.
    /// Only used for the legacy "player left" fan-out on disconnect.
    Everyone,
}

// ---------------------------------------------------------------------------
// Inbound: client actions
// ---------------------------------------------------------------------------

/// An action a client asks a room to perform.
///
/// Internally tagged, so the JSON reads
/// `{ "type": "correctGuess", "playerId": 2, "points": 170 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientAction {
    /// Join (or rejoin) the room. `is_host` is a hint only: it never
    /// displaces an existing host.
    JoinRoom {
        player_id: PlayerId,
        #[serde(default)]
        is_host: bool,
    },

    /// Leave the room.
    LeaveRoom { player_id: PlayerId },

    /// Start a round. Host only, needs enough players.
    StartGame { player_id: PlayerId },

    /// The player guessed the current target.
    CorrectGuess { player_id: PlayerId, points: i64 },

    /// The player guessed wrong. `points` may be zero or negative.
    WrongGuess { player_id: PlayerId, points: i64 },

    /// Zero the player's score.
    ResetScore { player_id: PlayerId },

    /// End the running round early.
    FinishGame { player_id: PlayerId },
}

impl ClientAction {
    /// The wire name of the action, used in acknowledgments and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom { .. } => "leaveRoom",
            Self::StartGame { .. } => "startGame",
            Self::CorrectGuess { .. } => "correctGuess",
            Self::WrongGuess { .. } => "wrongGuess",
            Self::ResetScore { .. } => "resetScore",
            Self::FinishGame { .. } => "finishGame",
        }
    }

    /// The player performing the action.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::JoinRoom { player_id, .. }
            | Self::LeaveRoom { player_id }
            | Self::StartGame { player_id }
            | Self::CorrectGuess { player_id, .. }
            | Self::WrongGuess { player_id, .. }
            | Self::ResetScore { player_id }
            | Self::FinishGame { player_id } => *player_id,
        }
    }
}

/// A client action addressed to one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub room_id: RoomId,
    pub action: ClientAction,
}

/// Creates a player. Handled outside any room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPlayer {
    pub name: String,
}

impl RegisterPlayer {
    /// The wire name used in acknowledgments.
    pub const ACTION: &'static str = "registerPlayer";
}

/// Anything a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Room(ClientRequest),
    Register(RegisterPlayer),
}

// ---------------------------------------------------------------------------
// Outbound: room events
// ---------------------------------------------------------------------------

/// The winner announced in [`ServerEvent::GameEnded`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u64,
}

/// A state change produced by a room session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        is_host: bool,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerCountUpdated {
        count: usize,
    },
    HostChanged {
        host_id: PlayerId,
    },
    GameStarted {
        target: u32,
        time_remaining: u32,
    },
    /// Private catch-up for a connection joining a running round.
    GameInProgress {
        target: Option<u32>,
        time_remaining: u32,
    },
    TimeUpdate {
        time_remaining: u32,
    },
    TargetUpdate {
        target: u32,
    },
    ScoreUpdated {
        player_id: PlayerId,
        score: u64,
    },
    GameEnded {
        winner: Option<Winner>,
    },
}

impl ServerEvent {
    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::PlayerCountUpdated { .. } => "playerCountUpdated",
            Self::HostChanged { .. } => "hostChanged",
            Self::GameStarted { .. } => "gameStarted",
            Self::GameInProgress { .. } => "gameInProgress",
            Self::TimeUpdate { .. } => "timeUpdate",
            Self::TargetUpdate { .. } => "targetUpdate",
            Self::ScoreUpdated { .. } => "scoreUpdated",
            Self::GameEnded { .. } => "gameEnded",
        }
    }
}

/// A [`ServerEvent`] together with the room it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    pub room_id: RoomId,
    pub event: ServerEvent,
}

/// The answer to one client request. Sent to the requester only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// `seq` of the request envelope being answered.
    pub in_reply_to: u64,
    /// Wire name of the action (`"startGame"`, ...).
    pub action: String,
    pub success: bool,
    /// Human-readable reason when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Id of the player a `registerPlayer` request created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
}

impl Ack {
    /// A successful acknowledgment.
    pub fn ok(in_reply_to: u64, action: &str) -> Self {
        Self {
            in_reply_to,
            action: action.to_string(),
            success: true,
            reason: None,
            player_id: None,
        }
    }

    /// A successful `registerPlayer` acknowledgment.
    pub fn registered(in_reply_to: u64, player_id: PlayerId) -> Self {
        Self {
            player_id: Some(player_id),
            ..Self::ok(in_reply_to, RegisterPlayer::ACTION)
        }
    }

    /// A rejected acknowledgment carrying the reason.
    pub fn rejected(
        in_reply_to: u64,
        action: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            in_reply_to,
            action: action.to_string(),
            success: false,
            reason: Some(reason.into()),
            player_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload / Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
///
/// Adjacently tagged: `{ "type": "Event", "data": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Client → Server.
    Request(ClientRequest),
    /// Client → Server: create a player.
    Register(RegisterPlayer),
    /// Server → Client: answer to a request.
    Ack(Ack),
    /// Server → Client: a room state change.
    Event(RoomEvent),
}

impl Payload {
    /// The wire tag of the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "Request",
            Self::Register(_) => "Register",
            Self::Ack(_) => "Ack",
            Self::Event(_) => "Event",
        }
    }
}

/// The top-level message wrapper. Every message on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number.
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! JSON shape tests. A mismatch here means the browser client can't
    //! parse our messages, so the exact field names are asserted.

    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(RoomId(3).to_string(), "R-3");
        assert_eq!(ConnectionId::new(9).to_string(), "conn-9");
    }

    #[test]
    fn test_connection_id_into_inner() {
        assert_eq!(ConnectionId::new(42).into_inner(), 42);
    }

    // =====================================================================
    // ClientAction
    // =====================================================================

    #[test]
    fn test_join_room_json_format() {
        let action = ClientAction::JoinRoom {
            player_id: PlayerId(5),
            is_host: true,
        };
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["type"], "joinRoom");
        assert_eq!(json["playerId"], 5);
        assert_eq!(json["isHost"], true);
    }

    #[test]
    fn test_join_room_host_hint_defaults_to_false() {
        let json = r#"{ "type": "joinRoom", "playerId": 5 }"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            ClientAction::JoinRoom {
                player_id: PlayerId(5),
                is_host: false,
            }
        );
    }

    #[test]
    fn test_wrong_guess_accepts_negative_points() {
        let json = r#"{ "type": "wrongGuess", "playerId": 1, "points": -10 }"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            ClientAction::WrongGuess {
                player_id: PlayerId(1),
                points: -10,
            }
        );
    }

    #[test]
    fn test_action_name_matches_wire_tag() {
        let actions = [
            ClientAction::JoinRoom { player_id: PlayerId(1), is_host: false },
            ClientAction::LeaveRoom { player_id: PlayerId(1) },
            ClientAction::StartGame { player_id: PlayerId(1) },
            ClientAction::CorrectGuess { player_id: PlayerId(1), points: 1 },
            ClientAction::WrongGuess { player_id: PlayerId(1), points: 0 },
            ClientAction::ResetScore { player_id: PlayerId(1) },
            ClientAction::FinishGame { player_id: PlayerId(1) },
        ];
        for action in actions {
            let json = serde_json::to_value(&action).unwrap();
            assert_eq!(json["type"], action.name());
            assert_eq!(action.player_id(), PlayerId(1));
        }
    }

    #[test]
    fn test_unknown_action_type_returns_error() {
        let unknown = r#"{ "type": "flyToMoon", "playerId": 1 }"#;
        let result: Result<ClientAction, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_game_started_json_format() {
        let event = ServerEvent::GameStarted {
            target: 1,
            time_remaining: 180,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "gameStarted");
        assert_eq!(json["target"], 1);
        assert_eq!(json["timeRemaining"], 180);
    }

    #[test]
    fn test_game_ended_without_winner_is_null() {
        let event = ServerEvent::GameEnded { winner: None };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "gameEnded");
        assert!(json["winner"].is_null());
    }

    #[test]
    fn test_game_ended_winner_fields() {
        let event = ServerEvent::GameEnded {
            winner: Some(Winner {
                player_id: PlayerId(2),
                name: "bea".into(),
                score: 170,
            }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["winner"]["playerId"], 2);
        assert_eq!(json["winner"]["name"], "bea");
        assert_eq!(json["winner"]["score"], 170);
    }

    #[test]
    fn test_event_name_matches_wire_tag() {
        let event = ServerEvent::HostChanged { host_id: PlayerId(4) };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
        assert_eq!(json["hostId"], 4);
    }

    // =====================================================================
    // Ack / Envelope
    // =====================================================================

    #[test]
    fn test_ack_ok_omits_reason() {
        let json = serde_json::to_value(Ack::ok(4, "startGame")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["inReplyTo"], 4);
        assert!(json.get("reason").is_none());
        assert!(json.get("playerId").is_none());
    }

    #[test]
    fn test_registered_ack_carries_player_id() {
        let json = serde_json::to_value(Ack::registered(2, PlayerId(12))).unwrap();
        assert_eq!(json["action"], "registerPlayer");
        assert_eq!(json["success"], true);
        assert_eq!(json["playerId"], 12);
    }

    #[test]
    fn test_ack_rejected_carries_reason() {
        let ack = Ack::rejected(4, "startGame", "not enough players");
        assert!(!ack.success);
        assert_eq!(ack.reason.as_deref(), Some("not enough players"));
    }

    #[test]
    fn test_envelope_request_json_shape() {
        let json = r#"{
            "seq": 1,
            "payload": {
                "type": "Request",
                "data": {
                    "roomId": 3,
                    "action": { "type": "startGame", "playerId": 1 }
                }
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.timestamp, 0);
        match envelope.payload {
            Payload::Request(req) => {
                assert_eq!(req.room_id, RoomId(3));
                assert_eq!(
                    req.action,
                    ClientAction::StartGame { player_id: PlayerId(1) }
                );
            }
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn test_envelope_register_json_shape() {
        let json = r#"{
            "seq": 1,
            "payload": { "type": "Register", "data": { "name": "ana" } }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(
            envelope.payload,
            Payload::Register(RegisterPlayer { name: "ana".into() })
        );
        assert_eq!(envelope.payload.kind(), "Register");
    }

    #[test]
    fn test_decode_wrong_shape_returns_error() {
        let wrong = r#"{"name": "hello"}"#;
        let result: Result<Envelope, _> = serde_json::from_str(wrong);
        assert!(result.is_err());
    }
}
