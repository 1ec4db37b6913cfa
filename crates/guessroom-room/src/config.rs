//! Session configuration and round phase.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// InitialTarget
// ---------------------------------------------------------------------------

/// How the first target of a round is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialTarget {
    /// Always open with this number (removed from the pool).
    Fixed(u32),
    /// Draw the opening number from the full pool.
    Drawn,
}

impl Default for InitialTarget {
    /// Rounds open on 1; every later target is pool-drawn.
    fn default() -> Self {
        Self::Fixed(1)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room session of a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Targets are drawn from `1..=pool_size`.
    pub pool_size: u32,

    /// Length of a round in countdown ticks.
    pub round_seconds: u32,

    /// Minimum roster size to start a round.
    pub min_players: usize,

    /// Wall-clock time of one countdown tick.
    pub tick_interval: Duration,

    /// Opening-target policy.
    pub initial_target: InitialTarget,

    /// Capacity of each session's command channel.
    pub channel_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pool_size: 100,
            round_seconds: 180,
            min_players: 2,
            tick_interval: Duration::from_secs(1),
            initial_target: InitialTarget::default(),
            channel_size: 64,
        }
    }
}

impl SessionConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `pool_size` at least 2 (a refill must leave something to draw)
    /// - `round_seconds`, `min_players`, `channel_size` at least 1
    /// - a fixed opening target outside `1..=pool_size` falls back to 1
    pub fn validated(mut self) -> Self {
        if self.pool_size < 2 {
            warn!(pool_size = self.pool_size, "pool_size below 2, clamping");
            self.pool_size = 2;
        }
        if self.round_seconds == 0 {
            warn!("round_seconds is 0, clamping to 1");
            self.round_seconds = 1;
        }
        if self.min_players == 0 {
            warn!("min_players is 0, clamping to 1");
            self.min_players = 1;
        }
        if self.channel_size == 0 {
            warn!("channel_size is 0, clamping to 1");
            self.channel_size = 1;
        }
        if let InitialTarget::Fixed(value) = self.initial_target {
            if value == 0 || value > self.pool_size {
                warn!(
                    value,
                    pool_size = self.pool_size,
                    "fixed initial target outside pool, using 1"
                );
                self.initial_target = InitialTarget::Fixed(1);
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a room session.
///
/// ```text
/// Idle ──start──→ Running ──(expiry | finish)──→ Ending ──→ Idle
///                    └──start (restart)──┘
/// ```
///
/// `Ending` only exists while the winner is being computed; since a session
/// handles one event at a time, no other event ever observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Idle,
    Running,
    Ending,
}

impl RoomPhase {
    /// Returns `true` while a round is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Ending => write!(f, "Ending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.pool_size, 100);
        assert_eq!(config.round_seconds, 180);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.initial_target, InitialTarget::Fixed(1));
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let config = SessionConfig {
            pool_size: 1,
            round_seconds: 0,
            min_players: 0,
            channel_size: 0,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.round_seconds, 1);
        assert_eq!(config.min_players, 1);
        assert_eq!(config.channel_size, 1);
    }

    #[test]
    fn test_validated_rejects_fixed_target_outside_pool() {
        let config = SessionConfig {
            pool_size: 10,
            initial_target: InitialTarget::Fixed(11),
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.initial_target, InitialTarget::Fixed(1));
    }

    #[test]
    fn test_validated_keeps_drawn_policy() {
        let config = SessionConfig {
            initial_target: InitialTarget::Drawn,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.initial_target, InitialTarget::Drawn);
    }

    #[test]
    fn test_room_phase_is_running() {
        assert!(!RoomPhase::Idle.is_running());
        assert!(RoomPhase::Running.is_running());
        assert!(!RoomPhase::Ending.is_running());
    }

    #[test]
    fn test_room_phase_display() {
        assert_eq!(RoomPhase::Idle.to_string(), "Idle");
        assert_eq!(RoomPhase::Running.to_string(), "Running");
    }
}
