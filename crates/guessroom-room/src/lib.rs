//! Room session orchestration for guessroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! roster, round state, target pool and countdown. Actions and countdown
//! ticks for one room are handled strictly one at a time; different rooms
//! run independently.
//!
//! # Key types
//!
//! - [`SessionRegistry`]: creates and drops sessions, routes actions
//! - [`RoomSession`]: the per-room state machine
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`BroadcastRouter`]: delivers events by scope
//! - [`NumberPool`] / [`ScoreLedger`]: target draws and score writes
//! - [`SessionConfig`]: round length, pool size, player minimum

mod config;
mod error;
mod ledger;
mod pool;
mod registry;
mod room;
mod router;
mod session;

pub use config::{InitialTarget, RoomPhase, SessionConfig};
pub use error::RoomError;
pub use ledger::{ScoreLedger, apply_delta};
pub use pool::NumberPool;
pub use registry::SessionRegistry;
pub use room::{DispatchOutcome, RoomHandle, spawn_room};
pub use router::{BroadcastRouter, Peer, PeerSender};
pub use session::{OutboundEvent, RoomInfo, RoomSession, SessionEvent};
