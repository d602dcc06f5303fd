#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod seed;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use seed::WorldSeed;

/// Fixed tick type (60 TPS => ~16.7 ms per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }

    /// True when this tick lands on a multiple of `period`.
    ///
    /// A zero period never fires.
    pub fn every(self, period: u64) -> bool {
        period != 0 && self.0 % period == 0
    }
}

/// Helper to derive a reproducible RNG seeded by world + tick domains.
pub fn scoped_rng(world_seed: u64, domain_hash: u64, tick: SimTick) -> StdRng {
    let seed = world_seed ^ domain_hash ^ tick.0;
    StdRng::seed_from_u64(seed)
}

/// Mix a pair of signed coordinates into a domain hash for [`scoped_rng`].
pub fn coord_hash(x: i32, y: i32) -> u64 {
    let hx = (x as u32 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let hy = (y as u32 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    (hx ^ hy.rotate_left(31)).wrapping_add(0x1656_67B1_9E37_79F9)
}
