//! Cancellable round countdown for guessroom.
//!
//! Every room session owns one [`Countdown`]. While a round is running it
//! fires once per interval (one second by default), reporting the seconds
//! left; at zero it disarms itself. Cancelling is idempotent: the first
//! `cancel` stops the countdown and returns `true`, every later call is a
//! no-op returning `false`.
//!
//! # Integration
//!
//! The countdown sits inside the room actor's `tokio::select!` loop, next to
//! the command channel, so ticks and client actions share one serialized
//! path:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = countdown.wait_for_tick() => { /* decrement, maybe end round */ }
//!     }
//! }
//! ```
//!
//! While disarmed, [`Countdown::wait_for_tick`] pends forever, so the
//! `select!` only ever wakes for commands.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Countdown settings.
#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Time between two ticks. One tick = one second of round time.
    pub interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Shortest accepted interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// A config with a specific interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Countdown::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "countdown interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// One fired tick, returned by [`Countdown::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number within the current run (starts at 1).
    pub tick: u64,
    /// Seconds left after this tick. `0` means the countdown just expired.
    pub remaining: u32,
    /// `true` if the tick fired more than a tenth of an interval late.
    pub overrun: bool,
}

impl TickInfo {
    /// Whether this tick ended the countdown.
    pub fn expired(&self) -> bool {
        self.remaining == 0
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A per-session, restartable, cancellable countdown.
pub struct Countdown {
    interval: Duration,
    remaining: u32,
    tick_count: u64,
    /// When the next tick is due. `None` while disarmed.
    next_tick: Option<Instant>,
    /// Incremented on every `start`, so logs can tell runs apart.
    run: u64,
}

impl Countdown {
    /// Creates a disarmed countdown.
    pub fn new(config: CountdownConfig) -> Self {
        let config = config.validated();
        Self {
            interval: config.interval,
            remaining: 0,
            tick_count: 0,
            next_tick: None,
            run: 0,
        }
    }

    /// Arms the countdown for `seconds` ticks, replacing any run in progress.
    ///
    /// Zero seconds leaves the countdown disarmed.
    pub fn start(&mut self, seconds: u32) {
        if self.cancel() {
            debug!(run = self.run, "previous countdown replaced");
        }
        self.run += 1;
        self.remaining = seconds;
        self.tick_count = 0;
        self.next_tick = (seconds > 0).then(|| Instant::now() + self.interval);
        debug!(run = self.run, seconds, "countdown started");
    }

    /// Stops the countdown. Returns `true` only if it was running.
    ///
    /// Safe to call any number of times.
    pub fn cancel(&mut self) -> bool {
        match self.next_tick.take() {
            Some(_) => {
                debug!(
                    run = self.run,
                    remaining = self.remaining,
                    "countdown cancelled"
                );
                true
            }
            None => false,
        }
    }

    /// Waits until the next tick is due and counts one second down.
    ///
    /// Pends forever while disarmed. Cancel-safe: dropping the future before
    /// it resolves leaves the countdown untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > self.interval / 10;

        self.tick_count += 1;
        self.remaining = self.remaining.saturating_sub(1);

        self.next_tick = if self.remaining == 0 {
            debug!(run = self.run, ticks = self.tick_count, "countdown expired");
            None
        } else if late_by >= self.interval {
            // Far behind: resume the cadence from now instead of bursting.
            warn!(
                run = self.run,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "countdown tick overrun, skipping ahead"
            );
            Some(now + self.interval)
        } else {
            Some(next + self.interval)
        };

        trace!(
            run = self.run,
            tick = self.tick_count,
            remaining = self.remaining,
            "countdown tick"
        );

        TickInfo {
            tick: self.tick_count,
            remaining: self.remaining,
            overrun,
        }
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Seconds left in the current (or last) run.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Ticks fired in the current (or last) run.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(CountdownConfig::default())
    }
}
