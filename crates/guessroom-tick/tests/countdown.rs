//! Integration tests for the round countdown.
//!
//! Uses a paused Tokio clock (`start_paused = true`): sleeps resolve as soon
//! as the runtime is otherwise idle, so a 180-second round runs instantly.

use std::time::Duration;

use guessroom_tick::{Countdown, CountdownConfig, TickInfo};

// =========================================================================
// Helpers
// =========================================================================

fn one_second() -> Countdown {
    Countdown::new(CountdownConfig::default())
}

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_default_interval_is_one_second() {
    assert_eq!(CountdownConfig::default().interval, Duration::from_secs(1));
    assert_eq!(one_second().interval(), Duration::from_secs(1));
}

#[test]
fn test_zero_interval_is_clamped() {
    let c = Countdown::new(CountdownConfig::with_interval(Duration::ZERO));
    assert_eq!(c.interval(), CountdownConfig::MIN_INTERVAL);
}

#[test]
fn test_new_countdown_is_disarmed() {
    let c = one_second();
    assert!(!c.is_running());
    assert_eq!(c.remaining(), 0);
    assert_eq!(c.tick_count(), 0);
}

// =========================================================================
// Ticking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_count_down_to_expiry() {
    let mut c = one_second();
    c.start(3);
    assert!(c.is_running());

    let remaining: Vec<u32> = {
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(c.wait_for_tick().await.remaining);
        }
        out
    };
    assert_eq!(remaining, vec![2, 1, 0]);
    assert!(!c.is_running(), "countdown disarms itself at zero");
    assert_eq!(c.tick_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_last_tick_reports_expired() {
    let mut c = one_second();
    c.start(1);
    let info = c.wait_for_tick().await;
    assert_eq!(
        info,
        TickInfo {
            tick: 1,
            remaining: 0,
            overrun: false
        }
    );
    assert!(info.expired());
}

#[tokio::test(start_paused = true)]
async fn test_ticks_fire_on_steady_cadence() {
    let mut c = one_second();
    let begin = tokio::time::Instant::now();
    c.start(5);
    for _ in 0..5 {
        c.wait_for_tick().await;
    }
    assert_eq!(begin.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_countdown_pends_forever() {
    let mut c = one_second();
    let result =
        tokio::time::timeout(Duration::from_secs(60), c.wait_for_tick()).await;
    assert!(result.is_err(), "disarmed countdown should never fire");
}

#[tokio::test(start_paused = true)]
async fn test_start_zero_seconds_stays_disarmed() {
    let mut c = one_second();
    c.start(0);
    assert!(!c.is_running());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let mut c = one_second();
    c.start(10);
    assert!(c.cancel(), "first cancel stops a running countdown");
    assert!(!c.cancel(), "second cancel is a no-op");
    assert!(!c.cancel());
    assert!(!c.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_countdown_never_ticks_again() {
    let mut c = one_second();
    c.start(10);
    c.wait_for_tick().await;
    c.cancel();

    let result =
        tokio::time::timeout(Duration::from_secs(30), c.wait_for_tick()).await;
    assert!(result.is_err());
    assert_eq!(c.remaining(), 9, "cancel keeps the last reading");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_expiry_returns_false() {
    let mut c = one_second();
    c.start(1);
    c.wait_for_tick().await;
    assert!(!c.cancel());
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_previous_run() {
    let mut c = one_second();
    c.start(10);
    c.wait_for_tick().await;

    // Rapid stop/start: only the new run ticks.
    c.start(2);
    let first = c.wait_for_tick().await;
    assert_eq!(first.tick, 1);
    assert_eq!(first.remaining, 1);
    let second = c.wait_for_tick().await;
    assert!(second.expired());

    let result =
        tokio::time::timeout(Duration::from_secs(30), c.wait_for_tick()).await;
    assert!(result.is_err(), "no leftover ticks from the replaced run");
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_is_cancel_safe() {
    let mut c = one_second();
    c.start(3);

    // Abandon a wait halfway through the interval.
    let result =
        tokio::time::timeout(Duration::from_millis(500), c.wait_for_tick())
            .await;
    assert!(result.is_err());
    assert_eq!(c.remaining(), 3);

    let info = c.wait_for_tick().await;
    assert_eq!(info.remaining, 2);
}
