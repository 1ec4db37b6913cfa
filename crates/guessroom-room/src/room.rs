//! Room actor: an isolated Tokio task that owns one room session.
//!
//! Each room runs in its own task. Client actions arrive over a bounded
//! mpsc channel, countdown ticks come from the session's own countdown, and
//! both are drained by one `tokio::select!` loop, so a room only ever does
//! one thing at a time. Events of a transition are handed to the router
//! before the next command is taken.

use std::ops::ControlFlow;

use guessroom_protocol::{ClientAction, ConnectionId, RoomEvent, RoomId};
use guessroom_store::{Player, PlayerStore};
use guessroom_tick::TickInfo;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    BroadcastRouter, OutboundEvent, Peer, RoomError, RoomInfo, RoomSession,
    SessionEvent,
};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// What one command did: the events it caused and the connection bindings
/// it changed in this room.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub events: Vec<OutboundEvent>,
    /// Connection newly bound to a player here.
    pub bound: Option<ConnectionId>,
    /// Connections that no longer speak for anyone here.
    pub unbound: Vec<ConnectionId>,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Apply a client action on behalf of a connection.
    Dispatch {
        peer: Peer,
        action: ClientAction,
        reply: Reply<DispatchOutcome>,
    },

    /// A connection bound to this room went away.
    Disconnect {
        connection: ConnectionId,
        reply: Reply<DispatchOutcome>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Leaderboard {
        reply: Reply<Vec<Player>>,
    },

    /// Stop the actor without touching the roster.
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it is just an `mpsc::Sender` wrapper. Once the actor
/// has stopped (its roster emptied, or it was shut down) every call fails
/// with [`RoomError::Unavailable`] and [`is_closed`](Self::is_closed)
/// returns `true`.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Whether the actor behind this handle has stopped taking commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Applies a client action and waits for its outcome.
    pub async fn dispatch(
        &self,
        peer: Peer,
        action: ClientAction,
    ) -> Result<DispatchOutcome, RoomError> {
        self.request(|reply| RoomCommand::Dispatch {
            peer,
            action,
            reply,
        })
        .await?
    }

    /// Removes whoever `connection` speaks for in this room.
    pub async fn disconnect(
        &self,
        connection: ConnectionId,
    ) -> Result<DispatchOutcome, RoomError> {
        self.request(|reply| RoomCommand::Disconnect { connection, reply })
            .await?
    }

    /// Requests a snapshot of the room.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Members ordered by score, highest first.
    pub async fn leaderboard(&self) -> Result<Vec<Player>, RoomError> {
        self.request(|reply| RoomCommand::Leaderboard { reply })
            .await?
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S> {
    room_id: RoomId,
    session: RoomSession<S>,
    router: BroadcastRouter,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: PlayerStore> RoomActor<S> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room session started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                tick = self.session.next_tick() => {
                    self.handle_tick(tick).await;
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room session stopped");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Dispatch {
                peer,
                action,
                reply,
            } => {
                let result = self.handle_action(peer, action).await;
                self.reply_and_check(reply, result)
            }
            RoomCommand::Disconnect { connection, reply } => {
                let result = self.handle_disconnect(connection).await;
                self.reply_and_check(reply, result)
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.session.info());
                ControlFlow::Continue(())
            }
            RoomCommand::Leaderboard { reply } => {
                let _ = reply.send(self.session.leaderboard().await);
                ControlFlow::Continue(())
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room_id, "room shutting down");
                self.receiver.close();
                ControlFlow::Break(())
            }
        }
    }

    async fn handle_action(
        &mut self,
        peer: Peer,
        action: ClientAction,
    ) -> Result<DispatchOutcome, RoomError> {
        let player_id = action.player_id();
        let name = action.name();
        let joining = matches!(action, ClientAction::JoinRoom { .. });
        let leaving = matches!(action, ClientAction::LeaveRoom { .. });
        let connection = peer.connection;

        let result = match self.router.player_for(connection) {
            Some(bound) if joining && bound != player_id => {
                Err(RoomError::ConnectionBound {
                    connection,
                    player_id: bound,
                    room_id: self.room_id,
                })
            }
            _ => {
                self.session
                    .handle(SessionEvent::from_action(action, connection))
                    .await
            }
        };
        let events = result.inspect_err(|e| {
            tracing::debug!(
                room_id = %self.room_id,
                %player_id,
                action = name,
                error = %e,
                "action refused"
            );
        })?;

        let mut outcome = DispatchOutcome::default();
        if joining {
            self.router.attach(peer, player_id);
            outcome.bound = Some(connection);
        }
        self.router.deliver(&events);
        if leaving {
            // The requester may be leaving on someone else's behalf; only
            // the leaver's own connections lose the room.
            outcome.unbound = self.router.detach_player(player_id);
        }
        outcome.events = events;
        Ok(outcome)
    }

    async fn handle_disconnect(
        &mut self,
        connection: ConnectionId,
    ) -> Result<DispatchOutcome, RoomError> {
        let player_id = self
            .router
            .detach(connection)
            .ok_or(RoomError::UnknownConnection(connection, self.room_id))?;

        let events = self
            .session
            .handle(SessionEvent::Disconnect { player_id })
            .await?;
        self.router.deliver(&events);

        let mut unbound = vec![connection];
        unbound.extend(self.router.detach_player(player_id));
        Ok(DispatchOutcome {
            events,
            bound: None,
            unbound,
        })
    }

    async fn handle_tick(&mut self, tick: TickInfo) {
        if tick.overrun {
            tracing::debug!(
                room_id = %self.room_id,
                tick = tick.tick,
                "countdown tick fired late"
            );
        }
        match self.session.handle(tick.into()).await {
            Ok(events) => self.router.deliver(&events),
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, error = %e, "tick failed");
            }
        }
    }

    /// Replies, stopping first if the roster is now empty.
    ///
    /// Closing the receiver before replying means the caller already sees
    /// [`RoomHandle::is_closed`] when the reply arrives.
    fn reply_and_check<T>(
        &mut self,
        reply: Reply<T>,
        result: Result<T, RoomError>,
    ) -> ControlFlow<()> {
        let empty = self.session.is_empty();
        if empty {
            self.receiver.close();
        }
        let _ = reply.send(result);
        if empty {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Spawns a room actor around `session` and returns a handle to it.
///
/// `channel_size` bounds the command queue; when it fills up, senders wait.
pub fn spawn_room<S: PlayerStore>(
    session: RoomSession<S>,
    global: broadcast::Sender<RoomEvent>,
    channel_size: usize,
) -> RoomHandle {
    let room_id = session.room_id();
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let actor = RoomActor {
        room_id,
        session,
        router: BroadcastRouter::new(room_id, global),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
