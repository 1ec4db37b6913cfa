//! Broadcast router: turns event scopes into concrete deliveries.

use std::collections::HashMap;

use guessroom_protocol::{ConnectionId, PlayerId, RoomEvent, RoomId, Scope};
use tokio::sync::{broadcast, mpsc};

use crate::OutboundEvent;

/// Channel sender for delivering room events to one connection.
pub type PeerSender = mpsc::UnboundedSender<RoomEvent>;

/// A connection as seen by a room: its address and its outbound channel.
#[derive(Debug, Clone)]
pub struct Peer {
    pub connection: ConnectionId,
    pub sender: PeerSender,
}

impl Peer {
    pub fn new(connection: ConnectionId, sender: PeerSender) -> Self {
        Self { connection, sender }
    }
}

struct Binding {
    player_id: PlayerId,
    sender: PeerSender,
}

/// Per-room delivery table, owned by the room actor.
///
/// Holds which connection speaks for which player in this room. `Everyone`
/// events go to the room's own connections first (keeping them in order
/// with the rest of the dispatch) and then to the process-wide channel;
/// connection handlers drop global copies for rooms they are joined to.
pub struct BroadcastRouter {
    room_id: RoomId,
    bindings: HashMap<ConnectionId, Binding>,
    global: broadcast::Sender<RoomEvent>,
}

impl BroadcastRouter {
    pub fn new(room_id: RoomId, global: broadcast::Sender<RoomEvent>) -> Self {
        Self {
            room_id,
            bindings: HashMap::new(),
            global,
        }
    }

    /// Binds a connection to a player. Rebinding replaces the old channel.
    pub fn attach(&mut self, peer: Peer, player_id: PlayerId) {
        tracing::debug!(
            room_id = %self.room_id,
            connection = %peer.connection,
            %player_id,
            "connection attached"
        );
        self.bindings.insert(
            peer.connection,
            Binding {
                player_id,
                sender: peer.sender,
            },
        );
    }

    /// Unbinds one connection, returning the player it spoke for.
    pub fn detach(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        self.bindings.remove(&connection).map(|b| b.player_id)
    }

    /// Unbinds every connection of a player.
    pub fn detach_player(&mut self, player_id: PlayerId) -> Vec<ConnectionId> {
        let connections: Vec<ConnectionId> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.player_id == player_id)
            .map(|(c, _)| *c)
            .collect();
        for connection in &connections {
            self.bindings.remove(connection);
        }
        connections
    }

    /// The player a connection speaks for in this room.
    pub fn player_for(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.bindings.get(&connection).map(|b| b.player_id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Delivers events in emission order.
    ///
    /// Sends to closed channels are dropped silently; the transport's
    /// disconnect hook cleans those bindings up.
    pub fn deliver(&self, events: &[OutboundEvent]) {
        for outbound in events {
            let event = outbound.to_room_event();
            match outbound.scope {
                Scope::Room => {
                    for binding in self.bindings.values() {
                        let _ = binding.sender.send(event.clone());
                    }
                }
                Scope::Connection(connection) => {
                    if let Some(binding) = self.bindings.get(&connection) {
                        let _ = binding.sender.send(event);
                    }
                }
                Scope::Everyone => {
                    for binding in self.bindings.values() {
                        let _ = binding.sender.send(event.clone());
                    }
                    // No subscribers is not an error.
                    let _ = self.global.send(event);
                }
            }
            tracing::trace!(
                room_id = %self.room_id,
                event = outbound.event.name(),
                scope = ?outbound.scope,
                "event routed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use guessroom_protocol::ServerEvent;

    use super::*;

    fn outbound(scope: Scope, event: ServerEvent) -> OutboundEvent {
        OutboundEvent {
            room_id: RoomId(1),
            scope,
            event,
        }
    }

    fn peer(id: u64) -> (Peer, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Peer::new(ConnectionId::new(id), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RoomEvent>) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(e) = rx.try_recv() {
            out.push(e.event);
        }
        out
    }

    #[test]
    fn test_room_scope_reaches_every_bound_connection() {
        let (global, _) = broadcast::channel(8);
        let mut router = BroadcastRouter::new(RoomId(1), global);
        let (p1, mut rx1) = peer(1);
        let (p2, mut rx2) = peer(2);
        router.attach(p1, PlayerId(1));
        router.attach(p2, PlayerId(2));

        router.deliver(&[outbound(
            Scope::Room,
            ServerEvent::PlayerCountUpdated { count: 2 },
        )]);

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[test]
    fn test_connection_scope_is_private() {
        let (global, _) = broadcast::channel(8);
        let mut router = BroadcastRouter::new(RoomId(1), global);
        let (p1, mut rx1) = peer(1);
        let (p2, mut rx2) = peer(2);
        router.attach(p1, PlayerId(1));
        router.attach(p2, PlayerId(2));

        router.deliver(&[outbound(
            Scope::Connection(ConnectionId::new(2)),
            ServerEvent::GameInProgress {
                target: Some(4),
                time_remaining: 100,
            },
        )]);

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[test]
    fn test_everyone_scope_hits_global_channel() {
        let (global, mut global_rx) = broadcast::channel(8);
        let mut router = BroadcastRouter::new(RoomId(1), global);
        let (p1, mut rx1) = peer(1);
        router.attach(p1, PlayerId(1));

        router.deliver(&[outbound(
            Scope::Everyone,
            ServerEvent::PlayerLeft {
                player_id: PlayerId(2),
            },
        )]);

        assert_eq!(drain(&mut rx1).len(), 1);
        let global_event = global_rx.try_recv().unwrap();
        assert_eq!(global_event.room_id, RoomId(1));
    }

    #[test]
    fn test_delivery_keeps_emission_order() {
        let (global, _) = broadcast::channel(8);
        let mut router = BroadcastRouter::new(RoomId(1), global);
        let (p1, mut rx1) = peer(1);
        router.attach(p1, PlayerId(1));

        router.deliver(&[
            outbound(Scope::Room, ServerEvent::HostChanged { host_id: PlayerId(1) }),
            outbound(Scope::Room, ServerEvent::PlayerLeft { player_id: PlayerId(2) }),
            outbound(Scope::Room, ServerEvent::PlayerCountUpdated { count: 1 }),
        ]);

        let names: Vec<_> = drain(&mut rx1).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["hostChanged", "playerLeft", "playerCountUpdated"]);
    }

    #[test]
    fn test_detach_player_drops_all_connections() {
        let (global, _) = broadcast::channel(8);
        let mut router = BroadcastRouter::new(RoomId(1), global);
        let (p1, _rx1) = peer(1);
        let (p2, _rx2) = peer(2);
        let (p3, _rx3) = peer(3);
        router.attach(p1, PlayerId(1));
        router.attach(p2, PlayerId(1));
        router.attach(p3, PlayerId(2));

        let mut dropped = router.detach_player(PlayerId(1));
        dropped.sort_by_key(|c| c.into_inner());
        assert_eq!(dropped, vec![ConnectionId::new(1), ConnectionId::new(2)]);
        assert_eq!(router.len(), 1);
        assert_eq!(router.player_for(ConnectionId::new(3)), Some(PlayerId(2)));
    }
}
