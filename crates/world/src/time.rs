//! Deterministic simulation time and day/night cycle.
//!
//! Daylight is a piecewise-linear function of the tick within the day:
//! it ramps up through dawn, holds through the day, ramps down through dusk
//! and holds at a dim floor overnight.

use serde::{Deserialize, Serialize};
use tilecraft_core::SimTick;

/// Ticks per full day.
pub const DAY_LENGTH: u64 = 48_000;
/// End of dawn.
pub const DAWN_END: u64 = 6_000;
/// End of full day.
pub const DAY_END: u64 = 32_000;
/// End of dusk; night lasts until the day wraps.
pub const DUSK_END: u64 = 36_000;

/// Dimmest light level, held through the night.
pub const DAYLIGHT_MIN: u8 = 16;
/// Brightest light level, held through the day.
pub const DAYLIGHT_MAX: u8 = 255;

/// Named part of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayPhase {
    Dawn,
    Day,
    Dusk,
    Night,
}

/// Simulation time state tracking day/night cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTime {
    /// Current simulation tick.
    pub tick: SimTick,
}

impl SimTime {
    /// Create a new SimTime starting at tick 0.
    pub fn new() -> Self {
        Self {
            tick: SimTick::ZERO,
        }
    }

    pub fn at(tick: SimTick) -> Self {
        Self { tick }
    }

    /// Advance time by one tick.
    pub fn advance(&mut self) {
        self.tick = self.tick.advance(1);
    }

    /// Tick within the current day.
    pub fn tick_in_day(&self) -> u64 {
        self.tick.0 % DAY_LENGTH
    }

    pub fn phase(&self) -> DayPhase {
        match self.tick_in_day() {
            t if t < DAWN_END => DayPhase::Dawn,
            t if t < DAY_END => DayPhase::Day,
            t if t < DUSK_END => DayPhase::Dusk,
            _ => DayPhase::Night,
        }
    }

    /// Ambient light level in `DAYLIGHT_MIN..=DAYLIGHT_MAX`.
    pub fn daylight(&self) -> u8 {
        let span = (DAYLIGHT_MAX - DAYLIGHT_MIN) as u64;
        let t = self.tick_in_day();
        let level = match self.phase() {
            DayPhase::Dawn => DAYLIGHT_MIN as u64 + t * span / DAWN_END,
            DayPhase::Day => DAYLIGHT_MAX as u64,
            DayPhase::Dusk => DAYLIGHT_MAX as u64 - (t - DAY_END) * span / (DUSK_END - DAY_END),
            DayPhase::Night => DAYLIGHT_MIN as u64,
        };
        level as u8
    }
}

impl Default for SimTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(tick: u64) -> SimTime {
        SimTime::at(SimTick(tick))
    }

    #[test]
    fn phases_cover_the_day() {
        assert_eq!(at(0).phase(), DayPhase::Dawn);
        assert_eq!(at(5_999).phase(), DayPhase::Dawn);
        assert_eq!(at(6_000).phase(), DayPhase::Day);
        assert_eq!(at(32_000).phase(), DayPhase::Dusk);
        assert_eq!(at(36_000).phase(), DayPhase::Night);
        assert_eq!(at(47_999).phase(), DayPhase::Night);
        assert_eq!(at(48_000).phase(), DayPhase::Dawn);
    }

    #[test]
    fn daylight_breakpoints() {
        assert_eq!(at(0).daylight(), DAYLIGHT_MIN);
        assert_eq!(at(3_000).daylight(), 16 + 119);
        assert_eq!(at(6_000).daylight(), DAYLIGHT_MAX);
        assert_eq!(at(32_000).daylight(), DAYLIGHT_MAX);
        assert_eq!(at(34_000).daylight(), 255 - 119);
        assert_eq!(at(40_000).daylight(), DAYLIGHT_MIN);
    }

    #[test]
    fn dawn_is_monotonic_and_dusk_falls() {
        let mut previous = 0;
        for t in (0..DAY_END).step_by(250) {
            let level = at(t).daylight();
            assert!(level >= previous);
            previous = level;
        }
        for t in (DAY_END..DUSK_END).step_by(250) {
            let level = at(t).daylight();
            assert!(level <= previous);
            previous = level;
        }
    }

    #[test]
    fn advance_wraps_into_next_day() {
        let mut time = at(DAY_LENGTH - 1);
        time.advance();
        assert_eq!(time.tick_in_day(), 0);
        assert_eq!(time.tick, SimTick(DAY_LENGTH));
    }
}
