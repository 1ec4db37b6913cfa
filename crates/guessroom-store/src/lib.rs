//! Player and room-membership storage for guessroom.
//!
//! The orchestrator does not own durable data. Players (with their
//! cumulative score) and room memberships live in an external key-value
//! store, reached only through the [`PlayerStore`] trait.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← reads/writes players and memberships through PlayerStore
//!     ↕
//! Store Layer (this crate)  ← records + the storage interface
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId, RoomId
//! ```
//!
//! [`MemoryStore`] is the in-process implementation used by the server
//! binary and by tests.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod record;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{Player, RoomMembership};
pub use store::PlayerStore;
