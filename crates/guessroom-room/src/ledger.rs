//! Score ledger: the only writer of player scores.

use std::sync::Arc;

use guessroom_protocol::PlayerId;
use guessroom_store::{Player, PlayerStore, StoreError};

/// Applies a signed delta to a score, flooring at zero.
pub fn apply_delta(score: u64, delta: i64) -> u64 {
    if delta >= 0 {
        score.saturating_add(delta.unsigned_abs())
    } else {
        score.saturating_sub(delta.unsigned_abs())
    }
}

/// Reads and writes cumulative scores through the player store.
///
/// Every write is a load-modify-save of the whole [`Player`] record. The
/// ledger relies on its owning session to serialize calls for a room.
pub struct ScoreLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for ScoreLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: PlayerStore> ScoreLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Adds `delta` (which may be negative) and returns the new score.
    pub async fn adjust(
        &self,
        player_id: PlayerId,
        delta: i64,
    ) -> Result<u64, StoreError> {
        let mut player = self.player(player_id).await?;
        player.score = apply_delta(player.score, delta);
        self.store.save_player(&player).await?;
        tracing::debug!(%player_id, delta, score = player.score, "score adjusted");
        Ok(player.score)
    }

    /// Sets the score back to zero. Returns the new score.
    pub async fn reset(&self, player_id: PlayerId) -> Result<u64, StoreError> {
        let mut player = self.player(player_id).await?;
        if player.score != 0 {
            player.score = 0;
            self.store.save_player(&player).await?;
        }
        Ok(0)
    }

    /// The player's current score.
    pub async fn score(&self, player_id: PlayerId) -> Result<u64, StoreError> {
        Ok(self.player(player_id).await?.score)
    }

    /// Loads the full player record.
    pub async fn player(
        &self,
        player_id: PlayerId,
    ) -> Result<Player, StoreError> {
        self.store
            .find_player(player_id)
            .await?
            .ok_or(StoreError::PlayerNotFound(player_id))
    }
}
