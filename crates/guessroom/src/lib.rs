//! # guessroom
//!
//! Multiplayer number-guessing room server.
//!
//! Players join rooms over WebSocket; the first to join hosts. The host
//! starts a timed round, everyone races to hit the current target number,
//! and when the countdown runs out the top scorer wins. Each room runs as
//! its own actor, so rooms never block each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use guessroom::prelude::*;
//!
//! # async fn run() -> Result<(), GuessroomError> {
//! let server = GuessroomServer::builder()
//!     .bind("127.0.0.1:5000")
//!     .session_config(SessionConfig::default())
//!     .build(Arc::new(MemoryStore::new()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::GuessroomError;
pub use server::{DEFAULT_BIND, GuessroomServer, GuessroomServerBuilder};

/// Everything needed to run a server or speak its protocol.
pub mod prelude {
    pub use crate::{
        DEFAULT_BIND, GuessroomError, GuessroomServer, GuessroomServerBuilder,
    };
    pub use guessroom_protocol::{
        Ack, ClientAction, ClientMessage, ClientRequest, Codec, ConnectionId,
        Envelope, JsonCodec, Payload, PlayerId, RegisterPlayer, RoomEvent,
        RoomId, Scope, ServerEvent, Winner,
    };
    pub use guessroom_room::{
        InitialTarget, RoomError, RoomInfo, RoomPhase, SessionConfig,
        SessionRegistry,
    };
    pub use guessroom_store::{
        MemoryStore, Player, PlayerStore, RoomMembership, StoreError,
    };
    pub use guessroom_tick::CountdownConfig;
}
