//! In-memory [`PlayerStore`] implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use guessroom_protocol::{PlayerId, RoomId};
use tokio::sync::Mutex;

use crate::{Player, PlayerStore, RoomMembership, StoreError};

#[derive(Default)]
struct Tables {
    players: HashMap<PlayerId, Player>,
    memberships: HashMap<(RoomId, PlayerId), RoomMembership>,
}

/// A [`PlayerStore`] backed by two hash maps behind one async mutex.
///
/// Writes are visible immediately; nothing survives a restart. For tests,
/// [`set_unavailable`](Self::set_unavailable) makes every call fail with
/// [`StoreError::Unavailable`], simulating a transient outage, and
/// [`fail_call`](Self::fail_call) fails a single upcoming call.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    next_player_id: AtomicU64,
    unavailable: AtomicBool,
    /// Calls left until the armed failure; 0 when disarmed.
    fail_countdown: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_player_id: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
            fail_countdown: AtomicU64::new(0),
        }
    }

    /// Toggles simulated outage mode.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the `nth` call from now (1 = the next one) fail once with
    /// [`StoreError::Unavailable`]. Calls before and after it succeed.
    pub fn fail_call(&self, nth: u64) {
        self.fail_countdown.store(nth, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        let armed = self
            .fail_countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if armed == Ok(1) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore for MemoryStore {
    async fn create_player(&self, name: &str) -> Result<Player, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        // Skip ids already taken by explicitly saved players.
        let id = loop {
            let id =
                PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed));
            if !tables.players.contains_key(&id) {
                break id;
            }
        };
        let player = Player::new(id, name);
        tables.players.insert(id, player.clone());
        tracing::debug!(player_id = %id, name, "player created");
        Ok(player)
    }

    async fn find_player(
        &self,
        id: PlayerId,
    ) -> Result<Option<Player>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.players.get(&id).cloned())
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<Player>, StoreError> {
        self.check_available()?;
        let mut players: Vec<Player> =
            self.tables.lock().await.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        players.truncate(limit);
        Ok(players)
    }

    async fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        self.check_available()?;
        self.tables
            .lock()
            .await
            .players
            .insert(player.id, player.clone());
        Ok(())
    }

    async fn find_membership(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<Option<RoomMembership>, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .memberships
            .get(&(room_id, player_id))
            .cloned())
    }

    async fn save_membership(
        &self,
        membership: &RoomMembership,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.tables.lock().await.memberships.insert(
            (membership.room_id, membership.player_id),
            membership.clone(),
        );
        Ok(())
    }

    async fn delete_membership(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .memberships
            .remove(&(room_id, player_id))
            .is_some())
    }

    async fn count_memberships(
        &self,
        room_id: RoomId,
    ) -> Result<usize, StoreError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .memberships
            .keys()
            .filter(|(rid, _)| *rid == room_id)
            .count())
    }

    async fn list_memberships(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<RoomMembership>, StoreError> {
        self.check_available()?;
        let mut members: Vec<RoomMembership> = self
            .tables
            .lock()
            .await
            .memberships
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        members.sort_by_key(RoomMembership::join_order);
        Ok(members)
    }
}
