//! The storage interface consumed by the room layer.
//!
//! guessroom doesn't ship a database. [`PlayerStore`] lists the handful of
//! create/find/update/delete operations the orchestrator needs, and the
//! deployment plugs in whatever backs them.

use std::future::Future;

use guessroom_protocol::{PlayerId, RoomId};

use crate::{Player, RoomMembership, StoreError};

/// Key-value access to players and room memberships.
///
/// Every method may suspend; the room actor awaits them inside a single
/// transition, so per-room ordering holds across these await points.
///
/// # Example
///
/// ```rust
/// use guessroom_protocol::PlayerId;
/// use guessroom_store::{MemoryStore, Player, PlayerStore};
///
/// # tokio_test_block_on(async {
/// let store = MemoryStore::new();
/// store.save_player(&Player::new(PlayerId(1), "ana")).await.unwrap();
/// let found = store.find_player(PlayerId(1)).await.unwrap();
/// assert_eq!(found.map(|p| p.name), Some("ana".to_string()));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub trait PlayerStore: Send + Sync + 'static {
    /// Registers a new player with a zero score and a store-assigned id.
    fn create_player(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;

    /// Looks up a player. `Ok(None)` if there is no such player.
    fn find_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;

    /// The `limit` highest-scoring players, best first. Equal scores are
    /// ordered by id.
    fn top_players(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send;

    /// Inserts or replaces a player record.
    fn save_player(
        &self,
        player: &Player,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Looks up one membership.
    fn find_membership(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Option<RoomMembership>, StoreError>> + Send;

    /// Inserts or replaces a membership.
    fn save_membership(
        &self,
        membership: &RoomMembership,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a membership. Returns whether one existed.
    fn delete_membership(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Number of memberships in a room.
    fn count_memberships(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// All memberships of a room, earliest joiner first.
    fn list_memberships(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<RoomMembership>, StoreError>> + Send;
}
