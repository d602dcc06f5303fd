//! Seeded gradient noise for terrain generation.
//!
//! A classic permutation-table lattice noise: the table is a seeded shuffle of
//! `0..=255` duplicated to 512 entries so corner lookups never wrap. Three
//! derived channels (elevation, humidity, temperature) sum eight octaves of the
//! base function with per-channel frequency and lacunarity.
//!
//! The permutation table is persisted with the world, so regenerating terrain
//! never depends on RNG implementation details after the first run.

use crate::error::{WorldError, WorldResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

/// Number of distinct lattice hashes.
pub const PERMUTATION_SIZE: usize = 256;

/// World-to-noise coordinate scale. Smaller values produce larger features.
pub const NOISE_SCALE: f64 = 0.0017;

/// Octaves summed per channel.
pub const OCTAVES: u32 = 8;

/// Amplitude decay between octaves, shared by every channel.
pub const PERSISTENCE: f64 = 0.46;

/// Gradient magnitudes step in eighths so a single sample stays inside [-1, 1].
const GRADIENT_STEP: f64 = 1.0 / 8.0;

/// Terrain channel sampled from the shared permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseChannel {
    /// Land height; drives the water/beach/land/mountain bands.
    Elevation,
    /// Moisture; splits hot land between desert and savanna and gates trees.
    Humidity,
    /// Warmth in [0, 1]; selects the cold, temperate or hot rule set.
    Temperature,
}

/// Multi-octave parameters for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    /// Frequency of the first octave.
    pub frequency: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
}

impl NoiseChannel {
    /// Tuned octave parameters for this channel.
    pub const fn config(self) -> ChannelConfig {
        match self {
            NoiseChannel::Elevation => ChannelConfig {
                frequency: 1.20,
                lacunarity: 2.10,
            },
            NoiseChannel::Humidity => ChannelConfig {
                frequency: 1.50,
                lacunarity: 2.05,
            },
            NoiseChannel::Temperature => ChannelConfig {
                frequency: 3.20,
                lacunarity: 2.15,
            },
        }
    }
}

/// One sample of every channel at a world tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// Elevation in [-1, 1].
    pub elevation: f64,
    /// Humidity in [-1, 1].
    pub humidity: f64,
    /// Temperature in [0, 1]; higher is warmer.
    pub temperature: f64,
}

/// Seeded lattice permutation, duplicated to avoid wraparound checks.
#[derive(Clone, PartialEq, Eq)]
pub struct Permutation {
    table: Vec<u8>,
}

impl Permutation {
    /// Shuffle `0..=255` with a seeded RNG.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut base: Vec<u8> = (0..=255u8).collect();
        base.shuffle(&mut rng);
        Self::duplicate(base)
    }

    /// Rebuild from a persisted 256-entry table.
    ///
    /// Rejects tables of the wrong length or with repeated entries.
    pub fn from_table(table: &[u8]) -> WorldResult<Self> {
        if table.len() != PERMUTATION_SIZE {
            return Err(WorldError::corrupt(format!(
                "permutation table has {} entries, expected {PERMUTATION_SIZE}",
                table.len()
            )));
        }
        let mut seen = [false; PERMUTATION_SIZE];
        for &value in table {
            if std::mem::replace(&mut seen[value as usize], true) {
                return Err(WorldError::corrupt(format!(
                    "permutation table repeats value {value}"
                )));
            }
        }
        Ok(Self::duplicate(table.to_vec()))
    }

    fn duplicate(mut base: Vec<u8>) -> Self {
        base.extend_from_within(..);
        Self { table: base }
    }

    /// The canonical 256 entries, suitable for persistence.
    pub fn to_table(&self) -> Vec<u8> {
        self.table[..PERMUTATION_SIZE].to_vec()
    }

    #[inline]
    fn p(&self, index: usize) -> usize {
        self.table[index] as usize
    }

    /// Base gradient noise at a point in noise space. Output lies in [-1, 1].
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        let fx = x.floor();
        let fy = y.floor();
        let xi = (fx as i64 & 255) as usize;
        let yi = (fy as i64 & 255) as usize;

        let x = x - fx;
        let y = y - fy;

        let u = fade(x);
        let v = fade(y);

        let a = self.p(xi) + yi;
        let b = self.p(xi + 1) + yi;

        lerp(
            v,
            lerp(u, grad(self.p(a), x, y), grad(self.p(b), x - 1.0, y)),
            lerp(
                u,
                grad(self.p(a + 1), x, y - 1.0),
                grad(self.p(b + 1), x - 1.0, y - 1.0),
            ),
        )
    }

    /// Normalised sum of [`OCTAVES`] octaves.
    pub fn octaves(&self, config: ChannelConfig, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = config.frequency;
        let mut amplitude = 1.0;
        let mut max_value = 0.0;

        for _ in 0..OCTAVES {
            total += self.noise(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= PERSISTENCE;
            frequency *= config.lacunarity;
        }

        total / max_value
    }

    /// Sample one channel at a point in noise space.
    pub fn sample(&self, channel: NoiseChannel, x: f64, y: f64) -> f64 {
        let value = self.octaves(channel.config(), x, y);
        match channel {
            NoiseChannel::Temperature => 1.0 - (value + 1.0) / 2.0,
            NoiseChannel::Elevation | NoiseChannel::Humidity => value,
        }
    }

    /// Sample all channels at a world tile.
    pub fn climate(&self, wx: i32, wy: i32) -> Climate {
        let tx = wx as f64 * NOISE_SCALE;
        let ty = wy as f64 * NOISE_SCALE;
        Climate {
            elevation: self.sample(NoiseChannel::Elevation, tx, ty),
            humidity: self.sample(NoiseChannel::Humidity, tx, ty),
            temperature: self.sample(NoiseChannel::Temperature, tx, ty),
        }
    }
}

impl fmt::Debug for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permutation")
            .field("head", &&self.table[..8])
            .finish_non_exhaustive()
    }
}

/// Quintic smoothstep `6t^5 - 15t^4 + 10t^3`.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Project the offset onto one of eight gradient steps, sign taken from bit 3.
#[inline]
fn grad(hash: usize, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let mut g = (1 + (h & 7)) as f64 * GRADIENT_STEP;
    if h & 8 != 0 {
        g = -g;
    }
    g * (x + y)
}
