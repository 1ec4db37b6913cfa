//! Target number pool.
//!
//! Targets are drawn without replacement from `1..=size`. When the pool runs
//! dry it is refilled with every number except the currently active target,
//! so a draw never repeats the target players are looking at.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::InitialTarget;

/// Per-session pool of candidate targets.
pub struct NumberPool {
    size: u32,
    remaining: Vec<u32>,
    active: Option<u32>,
    refills: u64,
    rng: StdRng,
}

impl NumberPool {
    /// Creates an empty pool over `1..=size`, seeded from the OS.
    ///
    /// Call [`reset`](Self::reset) or [`initial`](Self::initial) before
    /// drawing; an empty pool refills itself on the first draw.
    pub fn new(size: u32) -> Self {
        Self::with_rng(size, StdRng::from_os_rng())
    }

    /// Creates a pool with a deterministic generator.
    pub fn with_seed(size: u32, seed: u64) -> Self {
        Self::with_rng(size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(size: u32, rng: StdRng) -> Self {
        let size = if size < 2 {
            warn!(size, "number pool needs at least 2 values, clamping");
            2
        } else {
            size
        };
        Self {
            size,
            remaining: Vec::new(),
            active: None,
            refills: 0,
            rng,
        }
    }

    /// Refills with the full range and forgets the active target.
    pub fn reset(&mut self) {
        self.remaining = (1..=self.size).collect();
        self.active = None;
    }

    /// Marks `value` as the active target and removes it from the pool.
    pub fn seed(&mut self, value: u32) {
        self.remaining.retain(|v| *v != value);
        self.active = Some(value);
    }

    /// Draws a fresh target, refilling first if the pool is exhausted.
    ///
    /// The result is never the previously active target.
    pub fn draw(&mut self) -> u32 {
        if self.remaining.is_empty() {
            self.refill();
        }
        let index = self.rng.random_range(0..self.remaining.len());
        let value = self.remaining.swap_remove(index);
        self.active = Some(value);
        value
    }

    /// Resets the pool and picks the opening target of a round.
    pub fn initial(&mut self, policy: InitialTarget) -> u32 {
        self.reset();
        match policy {
            InitialTarget::Fixed(value) => {
                self.seed(value);
                value
            }
            InitialTarget::Drawn => self.draw(),
        }
    }

    /// Empties the pool at the end of a round.
    pub fn release(&mut self) {
        self.remaining.clear();
        self.active = None;
    }

    fn refill(&mut self) {
        let active = self.active;
        self.remaining = (1..=self.size).filter(|v| Some(*v) != active).collect();
        self.refills += 1;
        debug!(
            size = self.size,
            refills = self.refills,
            "number pool refilled"
        );
    }

    /// The current target, if a round is running.
    pub fn active(&self) -> Option<u32> {
        self.active
    }

    /// Numbers left before the next refill.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// How many times the pool has refilled itself.
    pub fn refills(&self) -> u64 {
        self.refills
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}
