//! Room session state machine.
//!
//! A [`RoomSession`] owns everything about one room: the roster (in join
//! order), the phase, the current target, the number pool and the round
//! countdown. Every input, whether a client action or a countdown tick, goes
//! through [`RoomSession::handle`], which returns the events to deliver.
//!
//! Transitions follow one rule: store writes first, in-memory state after.
//! If a store call fails the session is left exactly as it was and no events
//! are produced.

use std::sync::Arc;

use guessroom_protocol::{
    ClientAction, ConnectionId, PlayerId, RoomEvent, RoomId, Scope,
    ServerEvent, Winner,
};
use guessroom_store::{Player, PlayerStore, RoomMembership, StoreError};
use guessroom_tick::{Countdown, CountdownConfig, TickInfo};
use tracing::{debug, info, warn};

use crate::{NumberPool, RoomError, RoomPhase, ScoreLedger, SessionConfig};

// ---------------------------------------------------------------------------
// Events in and out
// ---------------------------------------------------------------------------

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Join {
        player_id: PlayerId,
        host_hint: bool,
        connection: ConnectionId,
    },
    Leave {
        player_id: PlayerId,
    },
    /// The player's connection dropped without a leave.
    Disconnect {
        player_id: PlayerId,
    },
    StartGame {
        player_id: PlayerId,
    },
    /// One countdown tick; `remaining` is the time left after it.
    Tick {
        remaining: u32,
    },
    CorrectGuess {
        player_id: PlayerId,
        points: i64,
    },
    WrongGuess {
        player_id: PlayerId,
        points: i64,
    },
    ResetScore {
        player_id: PlayerId,
    },
    FinishGame {
        player_id: PlayerId,
    },
}

impl SessionEvent {
    /// Maps a client action arriving on `connection`.
    pub fn from_action(action: ClientAction, connection: ConnectionId) -> Self {
        match action {
            ClientAction::JoinRoom { player_id, is_host } => Self::Join {
                player_id,
                host_hint: is_host,
                connection,
            },
            ClientAction::LeaveRoom { player_id } => Self::Leave { player_id },
            ClientAction::StartGame { player_id } => {
                Self::StartGame { player_id }
            }
            ClientAction::CorrectGuess { player_id, points } => {
                Self::CorrectGuess { player_id, points }
            }
            ClientAction::WrongGuess { player_id, points } => {
                Self::WrongGuess { player_id, points }
            }
            ClientAction::ResetScore { player_id } => {
                Self::ResetScore { player_id }
            }
            ClientAction::FinishGame { player_id } => {
                Self::FinishGame { player_id }
            }
        }
    }
}

impl From<TickInfo> for SessionEvent {
    fn from(tick: TickInfo) -> Self {
        Self::Tick {
            remaining: tick.remaining,
        }
    }
}

/// An event produced by a session, tagged with where it must go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub room_id: RoomId,
    pub scope: Scope,
    pub event: ServerEvent,
}

impl OutboundEvent {
    /// The wire form of the event.
    pub fn to_room_event(&self) -> RoomEvent {
        RoomEvent {
            room_id: self.room_id,
            event: self.event.clone(),
        }
    }
}

/// A snapshot of a room's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub target: Option<u32>,
    pub time_remaining: u32,
    pub player_count: usize,
    pub host: Option<PlayerId>,
    /// Members in join order.
    pub members: Vec<PlayerId>,
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// The state of one room.
pub struct RoomSession<S> {
    room_id: RoomId,
    config: SessionConfig,
    phase: RoomPhase,
    target: Option<u32>,
    roster: Vec<RoomMembership>,
    next_join_seq: u64,
    /// Whether the store's memberships for this room have been adopted.
    restored: bool,
    store: Arc<S>,
    ledger: ScoreLedger<S>,
    pool: NumberPool,
    countdown: Countdown,
}

impl<S: PlayerStore> RoomSession<S> {
    /// Creates an idle session with an empty roster.
    pub fn new(
        room_id: RoomId,
        config: SessionConfig,
        store: Arc<S>,
        ledger: ScoreLedger<S>,
        pool: NumberPool,
    ) -> Self {
        let countdown =
            Countdown::new(CountdownConfig::with_interval(config.tick_interval));
        Self {
            room_id,
            config,
            phase: RoomPhase::Idle,
            target: None,
            roster: Vec::new(),
            next_join_seq: 1,
            restored: false,
            store,
            ledger,
            pool,
            countdown,
        }
    }

    /// Creates a session with a ledger over `store` and an OS-seeded pool.
    pub fn with_store(
        room_id: RoomId,
        config: SessionConfig,
        store: Arc<S>,
    ) -> Self {
        let config = config.validated();
        let ledger = ScoreLedger::new(Arc::clone(&store));
        let pool = NumberPool::new(config.pool_size);
        Self::new(room_id, config, store, ledger, pool)
    }

    /// Applies one event. On error nothing changed and nothing is emitted.
    ///
    /// The first client event adopts whatever roster the store already
    /// holds for this room (see [`restore`](Self::restore)).
    pub async fn handle(
        &mut self,
        event: SessionEvent,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        if !self.restored && !matches!(event, SessionEvent::Tick { .. }) {
            self.restore().await?;
        }
        match event {
            SessionEvent::Join {
                player_id,
                host_hint,
                connection,
            } => self.join(player_id, host_hint, connection).await,
            SessionEvent::Leave { player_id } => {
                self.leave(player_id, Scope::Room).await
            }
            SessionEvent::Disconnect { player_id } => {
                self.leave(player_id, Scope::Everyone).await
            }
            SessionEvent::StartGame { player_id } => {
                self.start_game(player_id).await
            }
            SessionEvent::Tick { remaining } => Ok(self.tick(remaining).await),
            SessionEvent::CorrectGuess { player_id, points } => {
                self.correct_guess(player_id, points).await
            }
            SessionEvent::WrongGuess { player_id, points } => {
                self.wrong_guess(player_id, points).await
            }
            SessionEvent::ResetScore { player_id } => {
                self.reset_score(player_id).await
            }
            SessionEvent::FinishGame { player_id } => {
                self.finish_game(player_id).await
            }
        }
    }

    /// Adopts the memberships the store holds for this room.
    ///
    /// A session that starts over a room with surviving memberships (after
    /// a registry shutdown, or a persistent store across restarts) takes
    /// them as its roster. The earliest recorded host keeps the role; with
    /// none recorded the earliest joiner gets it. Returns the roster size.
    /// Runs once; later calls are no-ops.
    pub async fn restore(&mut self) -> Result<usize, StoreError> {
        if self.restored {
            return Ok(self.roster.len());
        }
        let mut members = self.store.list_memberships(self.room_id).await?;
        members.sort_by_key(RoomMembership::join_order);
        let host_index = members.iter().position(|m| m.is_host).unwrap_or(0);
        for (index, member) in members.iter_mut().enumerate() {
            let is_host = index == host_index;
            if member.is_host != is_host {
                member.is_host = is_host;
                self.store.save_membership(member).await?;
            }
        }

        if let Some(last) = members.last() {
            self.next_join_seq = last.join_seq + 1;
            info!(
                room_id = %self.room_id,
                players = members.len(),
                host = %members[host_index].player_id,
                "roster restored from store"
            );
        }
        self.roster = members;
        self.restored = true;
        Ok(self.roster.len())
    }

    /// Waits for the next countdown tick. Pends forever outside a round.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!`.
    pub async fn next_tick(&mut self) -> TickInfo {
        self.countdown.wait_for_tick().await
    }

    // -- transitions --------------------------------------------------------

    async fn join(
        &mut self,
        player_id: PlayerId,
        host_hint: bool,
        connection: ConnectionId,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        let player = self
            .store
            .find_player(player_id)
            .await?
            .ok_or(StoreError::PlayerNotFound(player_id))?;

        let existing = self.position(player_id);
        let mut membership = match existing {
            Some(index) => self.roster[index].clone(),
            None => RoomMembership::new(
                self.room_id,
                player_id,
                self.next_join_seq,
            ),
        };
        // The hint never overrides a sitting host.
        if self.host().is_none() {
            membership.is_host = true;
        }
        self.store.save_membership(&membership).await?;

        let is_host = membership.is_host;
        match existing {
            Some(index) => self.roster[index] = membership,
            None => {
                self.next_join_seq += 1;
                self.roster.push(membership);
            }
        }
        info!(
            room_id = %self.room_id,
            %player_id,
            %connection,
            is_host,
            host_hint,
            players = self.roster.len(),
            "player joined"
        );

        let mut events = vec![
            self.to_room(ServerEvent::PlayerJoined {
                player_id,
                name: player.name,
                is_host,
            }),
            self.to_room(ServerEvent::PlayerCountUpdated {
                count: self.roster.len(),
            }),
        ];
        if self.phase.is_running() {
            events.push(self.outbound(
                Scope::Connection(connection),
                ServerEvent::GameInProgress {
                    target: self.target,
                    time_remaining: self.time_remaining(),
                },
            ));
        }
        Ok(events)
    }

    async fn leave(
        &mut self,
        player_id: PlayerId,
        left_scope: Scope,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        let index = self.member_index(player_id)?;
        let successor = if self.roster[index].is_host {
            self.roster
                .iter()
                .filter(|m| m.player_id != player_id)
                .min_by_key(|m| m.join_order())
                .map(|m| RoomMembership {
                    is_host: true,
                    ..m.clone()
                })
        } else {
            None
        };

        // Promote before deleting: a failure in between never leaves the
        // stored room without a host.
        if let Some(successor) = &successor {
            self.store.save_membership(successor).await?;
        }
        if let Err(e) =
            self.store.delete_membership(self.room_id, player_id).await
        {
            if let Some(successor) = &successor {
                self.revert_promotion(successor.player_id).await;
            }
            return Err(e.into());
        }

        self.roster.remove(index);
        let mut events = Vec::with_capacity(3);
        if let Some(successor) = successor {
            let host_id = successor.player_id;
            if let Some(slot) =
                self.roster.iter_mut().find(|m| m.player_id == host_id)
            {
                *slot = successor;
            }
            info!(room_id = %self.room_id, %host_id, "host changed");
            events.push(self.to_room(ServerEvent::HostChanged { host_id }));
        }
        info!(
            room_id = %self.room_id,
            %player_id,
            players = self.roster.len(),
            "player left"
        );
        events.push(
            self.outbound(left_scope, ServerEvent::PlayerLeft { player_id }),
        );
        events.push(self.to_room(ServerEvent::PlayerCountUpdated {
            count: self.roster.len(),
        }));

        if self.roster.is_empty() {
            self.teardown();
        }
        Ok(events)
    }

    async fn start_game(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        let present = self.roster.len();
        if present < self.config.min_players {
            return Err(RoomError::InsufficientPlayers {
                room_id: self.room_id,
                required: self.config.min_players,
                present,
            });
        }
        if self.host() != Some(player_id) {
            return Err(RoomError::NotHost(player_id, self.room_id));
        }

        for member in &self.roster {
            self.ledger.reset(member.player_id).await?;
        }

        if self.countdown.cancel() {
            debug!(room_id = %self.room_id, "running round restarted");
        }
        let target = self.pool.initial(self.config.initial_target);
        self.target = Some(target);
        self.phase = RoomPhase::Running;
        self.countdown.start(self.config.round_seconds);
        info!(
            room_id = %self.room_id,
            target,
            seconds = self.config.round_seconds,
            players = self.roster.len(),
            "round started"
        );

        Ok(vec![self.to_room(ServerEvent::GameStarted {
            target,
            time_remaining: self.config.round_seconds,
        })])
    }

    async fn tick(&mut self, remaining: u32) -> Vec<OutboundEvent> {
        if !self.phase.is_running() {
            return Vec::new();
        }
        let mut events = vec![self.to_room(ServerEvent::TimeUpdate {
            time_remaining: remaining,
        })];
        if remaining == 0 {
            // Time is up: the round ends even if the scores can't be read.
            self.phase = RoomPhase::Ending;
            let winner = match self.find_winner().await {
                Ok(winner) => winner,
                Err(e) => {
                    warn!(
                        room_id = %self.room_id,
                        error = %e,
                        "could not read scores at expiry, ending without winner"
                    );
                    None
                }
            };
            events.push(self.close_round(winner));
        }
        events
    }

    async fn correct_guess(
        &mut self,
        player_id: PlayerId,
        points: i64,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        self.require_running()?;
        self.member_index(player_id)?;

        let score = self.ledger.adjust(player_id, points).await?;
        let target = self.pool.draw();
        self.target = Some(target);
        debug!(room_id = %self.room_id, %player_id, score, target, "correct guess");

        Ok(vec![
            self.to_room(ServerEvent::ScoreUpdated { player_id, score }),
            self.to_room(ServerEvent::TargetUpdate { target }),
        ])
    }

    async fn wrong_guess(
        &mut self,
        player_id: PlayerId,
        points: i64,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        self.require_running()?;
        self.member_index(player_id)?;

        let score = self.ledger.adjust(player_id, points).await?;
        debug!(room_id = %self.room_id, %player_id, score, "wrong guess");
        Ok(vec![
            self.to_room(ServerEvent::ScoreUpdated { player_id, score }),
        ])
    }

    async fn reset_score(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        self.member_index(player_id)?;
        let score = self.ledger.reset(player_id).await?;
        Ok(vec![
            self.to_room(ServerEvent::ScoreUpdated { player_id, score }),
        ])
    }

    async fn finish_game(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Vec<OutboundEvent>, RoomError> {
        self.member_index(player_id)?;
        self.require_running()?;

        self.phase = RoomPhase::Ending;
        let winner = match self.find_winner().await {
            Ok(winner) => winner,
            Err(e) => {
                self.phase = RoomPhase::Running;
                return Err(e.into());
            }
        };
        info!(room_id = %self.room_id, %player_id, "round finished early");
        Ok(vec![self.close_round(winner)])
    }

    // -- helpers ------------------------------------------------------------

    /// Strictly highest score wins; ties go to the earliest joiner.
    async fn find_winner(&self) -> Result<Option<Winner>, StoreError> {
        let mut best: Option<Player> = None;
        for member in &self.roster {
            let player = self.ledger.player(member.player_id).await?;
            if best.as_ref().is_none_or(|b| player.score > b.score) {
                best = Some(player);
            }
        }
        Ok(best.map(|p| Winner {
            player_id: p.id,
            name: p.name,
            score: p.score,
        }))
    }

    fn close_round(&mut self, winner: Option<Winner>) -> OutboundEvent {
        self.countdown.cancel();
        self.target = None;
        self.phase = RoomPhase::Idle;
        self.pool.release();
        info!(
            room_id = %self.room_id,
            winner = ?winner.as_ref().map(|w| w.player_id),
            "round ended"
        );
        self.to_room(ServerEvent::GameEnded { winner })
    }

    /// Writes back the in-memory (non-host) membership of `player_id` after
    /// a half-applied succession.
    async fn revert_promotion(&self, player_id: PlayerId) {
        let Some(index) = self.position(player_id) else {
            return;
        };
        if let Err(e) = self.store.save_membership(&self.roster[index]).await {
            warn!(
                room_id = %self.room_id,
                %player_id,
                error = %e,
                "could not revert host promotion"
            );
        }
    }

    /// Stops everything once the last member is gone.
    fn teardown(&mut self) {
        self.countdown.cancel();
        self.target = None;
        self.phase = RoomPhase::Idle;
        self.pool.release();
        debug!(room_id = %self.room_id, "roster empty, session released");
    }

    fn require_running(&self) -> Result<(), RoomError> {
        if self.phase.is_running() {
            Ok(())
        } else {
            Err(RoomError::NotRunning(self.room_id))
        }
    }

    fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.roster.iter().position(|m| m.player_id == player_id)
    }

    fn member_index(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        self.position(player_id)
            .ok_or(RoomError::PlayerNotInRoom(player_id, self.room_id))
    }

    fn outbound(&self, scope: Scope, event: ServerEvent) -> OutboundEvent {
        OutboundEvent {
            room_id: self.room_id,
            scope,
            event,
        }
    }

    fn to_room(&self, event: ServerEvent) -> OutboundEvent {
        self.outbound(Scope::Room, event)
    }

    // -- queries ------------------------------------------------------------

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn target(&self) -> Option<u32> {
        self.target
    }

    /// Seconds left in the round; zero outside a round.
    pub fn time_remaining(&self) -> u32 {
        if self.phase.is_running() {
            self.countdown.remaining()
        } else {
            0
        }
    }

    /// The current host, read from the memberships.
    pub fn host(&self) -> Option<PlayerId> {
        self.roster.iter().find(|m| m.is_host).map(|m| m.player_id)
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.position(player_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Memberships in join order.
    pub fn roster(&self) -> &[RoomMembership] {
        &self.roster
    }

    pub fn pool(&self) -> &NumberPool {
        &self.pool
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            phase: self.phase,
            target: self.target,
            time_remaining: self.time_remaining(),
            player_count: self.roster.len(),
            host: self.host(),
            members: self.roster.iter().map(|m| m.player_id).collect(),
        }
    }

    /// Members ordered by score, highest first (join order breaks ties).
    pub async fn leaderboard(&self) -> Result<Vec<Player>, RoomError> {
        let mut players = Vec::with_capacity(self.roster.len());
        for member in &self.roster {
            players.push(self.ledger.player(member.player_id).await?);
        }
        players.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use guessroom_store::MemoryStore;

    use super::*;
    use crate::InitialTarget;

    const CONN: ConnectionId = ConnectionId::new(1);

    async fn session() -> (RoomSession<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = SessionConfig::default();
        let session = RoomSession::new(
            RoomId(1),
            config,
            Arc::clone(&store),
            ScoreLedger::new(Arc::clone(&store)),
            NumberPool::with_seed(100, 42),
        );
        (session, store)
    }

    async fn player(store: &MemoryStore, name: &str) -> PlayerId {
        store.create_player(name).await.unwrap().id
    }

    async fn join(session: &mut RoomSession<MemoryStore>, id: PlayerId) {
        session
            .handle(SessionEvent::Join {
                player_id: id,
                host_hint: false,
                connection: CONN,
            })
            .await
            .unwrap();
    }

    fn names(events: &[OutboundEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.event.name()).collect()
    }

    #[tokio::test]
    async fn test_first_joiner_becomes_host() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;

        join(&mut s, a).await;
        let events = s
            .handle(SessionEvent::Join {
                player_id: b,
                host_hint: true,
                connection: CONN,
            })
            .await
            .unwrap();

        assert_eq!(s.host(), Some(a), "hint never displaces a sitting host");
        assert_eq!(
            events[0].event,
            ServerEvent::PlayerJoined {
                player_id: b,
                name: "b".into(),
                is_host: false
            }
        );
        assert_eq!(
            events[1].event,
            ServerEvent::PlayerCountUpdated { count: 2 }
        );
        assert_eq!(s.roster().iter().filter(|m| m.is_host).count(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_player_fails_without_change() {
        let (mut s, _store) = session().await;
        let err = s
            .handle(SessionEvent::Join {
                player_id: PlayerId(77),
                host_hint: false,
                connection: CONN,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RoomError::Store(StoreError::PlayerNotFound(_))
        ));
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn test_rejoin_keeps_single_membership() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        join(&mut s, a).await;
        join(&mut s, a).await;
        assert_eq!(s.roster().len(), 1);
        assert_eq!(store.count_memberships(RoomId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_start_with_one_player_is_insufficient() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        join(&mut s, a).await;

        let err = s
            .handle(SessionEvent::StartGame { player_id: a })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::InsufficientPlayers { present: 1, .. }));
        assert_eq!(s.phase(), RoomPhase::Idle);
    }

    #[tokio::test]
    async fn test_only_host_can_start() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;

        let err = s
            .handle(SessionEvent::StartGame { player_id: b })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotHost(id, _) if id == b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_resets_scores_and_opens_on_fixed_target() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        let mut stale = store.find_player(b).await.unwrap().unwrap();
        stale.score = 55;
        store.save_player(&stale).await.unwrap();
        join(&mut s, a).await;
        join(&mut s, b).await;

        let events = s
            .handle(SessionEvent::StartGame { player_id: a })
            .await
            .unwrap();
        assert_eq!(
            events,
            vec![OutboundEvent {
                room_id: RoomId(1),
                scope: Scope::Room,
                event: ServerEvent::GameStarted {
                    target: 1,
                    time_remaining: 180
                },
            }]
        );
        assert_eq!(store.find_player(b).await.unwrap().unwrap().score, 0);
        assert_eq!(s.phase(), RoomPhase::Running);
        assert_eq!(s.target(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drawn_initial_target_policy() {
        let store = Arc::new(MemoryStore::new());
        let config = SessionConfig {
            initial_target: InitialTarget::Drawn,
            pool_size: 10,
            ..SessionConfig::default()
        };
        let mut s = RoomSession::with_store(RoomId(3), config, Arc::clone(&store));
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;

        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();
        let target = s.target().unwrap();
        assert!((1..=10).contains(&target));
        assert_eq!(s.pool().remaining(), 9);
    }

    #[tokio::test]
    async fn test_guesses_require_running_round() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        join(&mut s, a).await;

        let err = s
            .handle(SessionEvent::CorrectGuess {
                player_id: a,
                points: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotRunning(_)));

        let err = s
            .handle(SessionEvent::WrongGuess {
                player_id: a,
                points: -1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotRunning(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_correct_guess_scores_and_redraws() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        let events = s
            .handle(SessionEvent::CorrectGuess {
                player_id: b,
                points: 170,
            })
            .await
            .unwrap();
        assert_eq!(names(&events), vec!["scoreUpdated", "targetUpdate"]);
        assert_eq!(
            events[0].event,
            ServerEvent::ScoreUpdated {
                player_id: b,
                score: 170
            }
        );
        let ServerEvent::TargetUpdate { target } = events[1].event else {
            panic!("expected targetUpdate");
        };
        assert_ne!(target, 1);
        assert_eq!(s.target(), Some(target));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_guess_clamps_at_zero() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        let events = s
            .handle(SessionEvent::WrongGuess {
                player_id: a,
                points: -25,
            })
            .await
            .unwrap();
        assert_eq!(
            events[0].event,
            ServerEvent::ScoreUpdated {
                player_id: a,
                score: 0
            }
        );
    }

    #[tokio::test]
    async fn test_reset_score_requires_membership() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let err = s
            .handle(SessionEvent::ResetScore { player_id: a })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::PlayerNotInRoom(..)));
    }

    #[tokio::test]
    async fn test_host_leave_promotes_earliest_remaining() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        let c = player(&store, "c").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        join(&mut s, c).await;

        let events = s.handle(SessionEvent::Leave { player_id: a }).await.unwrap();
        assert_eq!(
            names(&events),
            vec!["hostChanged", "playerLeft", "playerCountUpdated"]
        );
        assert_eq!(events[0].event, ServerEvent::HostChanged { host_id: b });
        assert_eq!(s.host(), Some(b));
        assert!(store.find_membership(RoomId(1), b).await.unwrap().unwrap().is_host);
        assert_eq!(store.find_membership(RoomId(1), a).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_disconnect_announces_leave_to_everyone() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;

        let events = s
            .handle(SessionEvent::Disconnect { player_id: b })
            .await
            .unwrap();
        assert_eq!(events[0].scope, Scope::Everyone);
        assert_eq!(events[0].event, ServerEvent::PlayerLeft { player_id: b });
        assert_eq!(events[1].scope, Scope::Room);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_leave_cancels_round() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        s.handle(SessionEvent::Leave { player_id: a }).await.unwrap();
        s.handle(SessionEvent::Leave { player_id: b }).await.unwrap();
        assert!(s.is_empty());
        assert_eq!(s.phase(), RoomPhase::Idle);

        let tick =
            tokio::time::timeout(Duration::from_secs(5), s.next_tick()).await;
        assert!(tick.is_err(), "no ticks after the room emptied");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_joiner_gets_private_catch_up() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        let c = player(&store, "c").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        let late = ConnectionId::new(9);
        let events = s
            .handle(SessionEvent::Join {
                player_id: c,
                host_hint: false,
                connection: late,
            })
            .await
            .unwrap();
        let catch_up = events.last().unwrap();
        assert_eq!(catch_up.scope, Scope::Connection(late));
        assert_eq!(
            catch_up.event,
            ServerEvent::GameInProgress {
                target: Some(1),
                time_remaining: 180
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_game_picks_first_joiner_on_tie() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        let events = s
            .handle(SessionEvent::FinishGame { player_id: b })
            .await
            .unwrap();
        let ServerEvent::GameEnded { winner: Some(winner) } = &events[0].event
        else {
            panic!("expected a winner");
        };
        assert_eq!(winner.player_id, a);
        assert_eq!(s.phase(), RoomPhase::Idle);
        assert_eq!(s.target(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_leaves_state_untouched() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();

        store.set_unavailable(true);
        let err = s
            .handle(SessionEvent::CorrectGuess {
                player_id: b,
                points: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));
        assert_eq!(s.target(), Some(1), "no redraw after a failed write");

        let err = s
            .handle(SessionEvent::Leave { player_id: a })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Store(_)));
        assert_eq!(s.host(), Some(a));
        assert_eq!(s.roster().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_succession_keeps_leaver_and_single_host() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;

        // 1st call promotes b, 2nd (deleting a) fails, 3rd reverts b.
        store.fail_call(2);
        let err = s
            .handle(SessionEvent::Leave { player_id: a })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));

        assert_eq!(s.host(), Some(a));
        assert_eq!(s.roster().len(), 2);
        let stored = store.list_memberships(RoomId(1)).await.unwrap();
        let hosts: Vec<_> =
            stored.iter().filter(|m| m.is_host).map(|m| m.player_id).collect();
        assert_eq!(hosts, vec![a]);
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_promotion_changes_nothing() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;

        store.fail_call(1);
        s.handle(SessionEvent::Leave { player_id: a })
            .await
            .unwrap_err();

        assert_eq!(s.host(), Some(a));
        assert!(store.find_membership(RoomId(1), a).await.unwrap().unwrap().is_host);
        assert!(!store.find_membership(RoomId(1), b).await.unwrap().unwrap().is_host);
    }

    #[tokio::test]
    async fn test_restore_adopts_stored_roster() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        let c = player(&store, "c").await;
        let mut host = RoomMembership::new(RoomId(1), a, 4);
        host.is_host = true;
        store.save_membership(&host).await.unwrap();
        store
            .save_membership(&RoomMembership::new(RoomId(1), b, 7))
            .await
            .unwrap();

        let events = s
            .handle(SessionEvent::Join {
                player_id: c,
                host_hint: true,
                connection: CONN,
            })
            .await
            .unwrap();

        assert_eq!(
            events[0].event,
            ServerEvent::PlayerJoined {
                player_id: c,
                name: "c".into(),
                is_host: false
            }
        );
        assert_eq!(events[1].event, ServerEvent::PlayerCountUpdated { count: 3 });
        assert_eq!(s.host(), Some(a));
        assert_eq!(s.info().members, vec![a, b, c]);
        assert_eq!(s.roster()[2].join_seq, 8);
    }

    #[tokio::test]
    async fn test_restore_without_recorded_host_promotes_earliest() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        store
            .save_membership(&RoomMembership::new(RoomId(1), b, 2))
            .await
            .unwrap();
        store
            .save_membership(&RoomMembership::new(RoomId(1), a, 1))
            .await
            .unwrap();

        assert_eq!(s.restore().await.unwrap(), 2);
        assert_eq!(s.host(), Some(a));
        assert!(store.find_membership(RoomId(1), a).await.unwrap().unwrap().is_host);
    }

    #[tokio::test]
    async fn test_restore_failure_is_retried_on_next_event() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;

        store.set_unavailable(true);
        let err = s
            .handle(SessionEvent::Join {
                player_id: a,
                host_hint: false,
                connection: CONN,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));
        store.set_unavailable(false);

        join(&mut s, a).await;
        assert_eq!(s.host(), Some(a));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaderboard_orders_by_score() {
        let (mut s, store) = session().await;
        let a = player(&store, "a").await;
        let b = player(&store, "b").await;
        join(&mut s, a).await;
        join(&mut s, b).await;
        s.handle(SessionEvent::StartGame { player_id: a }).await.unwrap();
        s.handle(SessionEvent::CorrectGuess {
            player_id: b,
            points: 30,
        })
        .await
        .unwrap();

        let board = s.leaderboard().await.unwrap();
        let ids: Vec<_> = board.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b, a]);
    }
}
