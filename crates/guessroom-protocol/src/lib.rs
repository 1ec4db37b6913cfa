//! Wire protocol for guessroom.
//!
//! This crate defines the "language" spoken between game clients and the
//! room session orchestrator:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`], [`ConnectionId`]): who and where.
//! - **Inbound** ([`ClientMessage`], [`ClientRequest`], [`ClientAction`],
//!   [`RegisterPlayer`]): what a client asks for.
//! - **Outbound** ([`RoomEvent`], [`ServerEvent`], [`Ack`]): what the
//!   orchestrator tells clients, and to whom ([`Scope`]).
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become frames.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about rooms, timers or storage. It only
//! describes messages and how to serialize them.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (session state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    Ack, ClientAction, ClientMessage, ClientRequest, ConnectionId, Envelope,
    Payload, PlayerId, RegisterPlayer, RoomEvent, RoomId, Scope, ServerEvent,
    Winner,
};
