//! Session registry: creates, tracks, and routes actions to room sessions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use guessroom_protocol::{ClientAction, ConnectionId, RoomEvent, RoomId};
use guessroom_store::{Player, PlayerStore};
use tokio::sync::{Mutex, broadcast};

use crate::room::spawn_room;
use crate::{
    DispatchOutcome, OutboundEvent, Peer, RoomError, RoomHandle, RoomInfo,
    RoomSession, SessionConfig,
};

/// Capacity of the process-wide event channel.
const GLOBAL_CHANNEL_SIZE: usize = 256;

/// Owns the live room sessions and the connection → rooms index.
///
/// This is the entry point for the transport layer. Sessions are created
/// lazily by the first action for a room and dropped once their roster
/// empties; a later action for the same room starts a fresh, idle session.
///
/// Locks are only held for map lookups, never while waiting on a session,
/// so a slow room cannot stall the others.
pub struct SessionRegistry<S> {
    store: Arc<S>,
    config: SessionConfig,
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    /// Rooms in which each connection speaks for a player.
    connections: Mutex<HashMap<ConnectionId, HashSet<RoomId>>>,
    global: broadcast::Sender<RoomEvent>,
}

impl<S: PlayerStore> SessionRegistry<S> {
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        let (global, _) = broadcast::channel(GLOBAL_CHANNEL_SIZE);
        Self {
            store,
            config: config.validated(),
            rooms: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            global,
        }
    }

    /// The live session for `room_id`, or a fresh idle one.
    pub async fn get_or_create(&self, room_id: RoomId) -> RoomHandle {
        let mut rooms = self.rooms.lock().await;
        if let Some(handle) = rooms.get(&room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
        }

        let session = RoomSession::with_store(
            room_id,
            self.config.clone(),
            Arc::clone(&self.store),
        );
        let handle = spawn_room(
            session,
            self.global.clone(),
            self.config.channel_size,
        );
        rooms.insert(room_id, handle.clone());
        tracing::info!(%room_id, rooms = rooms.len(), "room session created");
        handle
    }

    /// Routes one client action to its room and returns the events it caused.
    ///
    /// If the session stopped between lookup and delivery (its last member
    /// just left) the action is retried once against a fresh session.
    pub async fn dispatch(
        &self,
        room_id: RoomId,
        peer: Peer,
        action: ClientAction,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        let mut retried = false;
        let result = loop {
            let handle = self.get_or_create(room_id).await;
            match handle.dispatch(peer.clone(), action.clone()).await {
                Err(RoomError::Unavailable(_)) if !retried => {
                    tracing::debug!(%room_id, "stale room session, retrying");
                    retried = true;
                    self.remove_if_empty(room_id).await;
                }
                result => break result,
            }
        };

        let result = match result {
            Ok(outcome) => {
                self.rebind(room_id, &outcome).await;
                Ok(outcome.events)
            }
            Err(e) => Err(e),
        };
        self.remove_if_empty(room_id).await;
        result
    }

    /// Mirrors the bindings a room reported into the connection index.
    async fn rebind(&self, room_id: RoomId, outcome: &DispatchOutcome) {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = outcome.bound {
            connections.entry(connection).or_default().insert(room_id);
        }
        for connection in &outcome.unbound {
            if let Some(rooms) = connections.get_mut(connection) {
                rooms.remove(&room_id);
                if rooms.is_empty() {
                    connections.remove(connection);
                }
            }
        }
    }

    /// Drops the session for `room_id` if it stopped. Returns `true` if removed.
    pub async fn remove_if_empty(&self, room_id: RoomId) -> bool {
        let mut rooms = self.rooms.lock().await;
        match rooms.get(&room_id) {
            Some(handle) if handle.is_closed() => {
                rooms.remove(&room_id);
                tracing::info!(%room_id, rooms = rooms.len(), "room session removed");
                true
            }
            _ => false,
        }
    }

    /// Transport hook: `connection` is gone. Applies a disconnect in every
    /// room it had joined and returns the combined events.
    pub async fn disconnect(&self, connection: ConnectionId) -> Vec<OutboundEvent> {
        let joined = self
            .connections
            .lock()
            .await
            .remove(&connection)
            .unwrap_or_default();

        let mut events = Vec::new();
        for room_id in joined {
            let Some(handle) = self.handle(room_id).await else {
                continue;
            };
            match handle.disconnect(connection).await {
                Ok(outcome) => {
                    self.rebind(room_id, &outcome).await;
                    events.extend(outcome.events);
                }
                Err(e) => {
                    tracing::debug!(%room_id, %connection, error = %e, "disconnect skipped");
                }
            }
            self.remove_if_empty(room_id).await;
        }
        events
    }

    /// A snapshot of a live room.
    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        self.live_handle(room_id).await?.info().await
    }

    /// Members of a live room ordered by score, highest first.
    pub async fn leaderboard(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<Player>, RoomError> {
        self.live_handle(room_id).await?.leaderboard().await
    }

    /// Members recorded for a room in the store, live session or not.
    pub async fn player_count(&self, room_id: RoomId) -> Result<usize, RoomError> {
        Ok(self.store.count_memberships(room_id).await?)
    }

    /// Number of live sessions.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Whether `connection` speaks for a player in `room_id`.
    pub async fn is_bound(
        &self,
        connection: ConnectionId,
        room_id: RoomId,
    ) -> bool {
        self.connections
            .lock()
            .await
            .get(&connection)
            .is_some_and(|rooms| rooms.contains(&room_id))
    }

    /// Creates a player with a zero score. Names are trimmed and must not
    /// be empty.
    pub async fn register_player(
        &self,
        name: &str,
    ) -> Result<Player, RoomError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::EmptyName);
        }
        let player = self.store.create_player(name).await?;
        tracing::info!(
            player_id = %player.id,
            name = %player.name,
            "player registered"
        );
        Ok(player)
    }

    /// The `limit` highest-scoring players across all rooms.
    pub async fn top_players(
        &self,
        limit: usize,
    ) -> Result<Vec<Player>, RoomError> {
        Ok(self.store.top_players(limit).await?)
    }

    /// Subscribes to process-wide events (`Scope::Everyone`).
    pub fn subscribe_global(&self) -> broadcast::Receiver<RoomEvent> {
        self.global.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stops every session. Rosters stay in the store; the next session
    /// for a room picks its roster back up from there.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> =
            self.rooms.lock().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
        self.connections.lock().await.clear();
    }

    async fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms.lock().await.get(&room_id).cloned()
    }

    async fn live_handle(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        self.handle(room_id)
            .await
            .filter(|h| !h.is_closed())
            .ok_or(RoomError::NotFound(room_id))
    }
}
