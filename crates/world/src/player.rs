//! The player body: movement, stats and damage.

use crate::chunk::ChunkPos;
use crate::pathfinding::{GridPos, TileView};
use crate::tile::TileKind;
use crate::brain::PlayerView;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use tilecraft_core::SimTick;

/// Ceiling for health and energy.
pub const MAX_STAT: u8 = 10;
/// Tiles per tick.
pub const PLAYER_SPEED: f32 = 0.08;
/// Invulnerability ticks after taking damage.
pub const PLAYER_HURT_TICKS: u32 = 8;
/// Distance pushed back when hurt.
pub const KNOCKBACK: f32 = 0.35;
/// Energy spent per attack.
pub const ATTACK_ENERGY: u8 = 3;

/// Persisted form of a [`Player`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub position: Vec2,
    /// Sub-tile offset of `position`, kept for renderers.
    pub offset: Vec2,
    pub facing: Vec2,
    pub health: u8,
    pub energy: u8,
    pub chunk: ChunkPos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub position: Vec2,
    pub facing: Vec2,
    pub health: u8,
    pub energy: u8,
    pub hurt_time: u32,
    pub swim_time: u32,
}

impl Player {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            facing: Vec2::Y,
            health: MAX_STAT,
            energy: MAX_STAT,
            hurt_time: 0,
            swim_time: 0,
        }
    }

    pub fn from_record(record: &PlayerRecord) -> Self {
        Self {
            position: record.position,
            facing: record.facing,
            health: record.health.min(MAX_STAT),
            energy: record.energy.min(MAX_STAT),
            hurt_time: 0,
            swim_time: 0,
        }
    }

    pub fn record(&self) -> PlayerRecord {
        PlayerRecord {
            position: self.position,
            offset: self.offset(),
            facing: self.facing,
            health: self.health,
            energy: self.energy,
            chunk: self.chunk(),
        }
    }

    /// Fractional part of the position inside its tile.
    pub fn offset(&self) -> Vec2 {
        self.position - self.position.floor()
    }

    pub fn cell(&self) -> GridPos {
        GridPos::from_world(self.position)
    }

    pub fn chunk(&self) -> ChunkPos {
        let cell = self.cell();
        ChunkPos::containing(cell.x, cell.y)
    }

    /// The tile the player is facing.
    pub fn target_cell(&self) -> GridPos {
        let cell = self.cell();
        cell.offset(self.facing.x.round() as i32, self.facing.y.round() as i32)
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            position: self.position,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    pub fn swimming(&self, view: &impl TileView) -> bool {
        let cell = self.cell();
        view.peek(cell.x, cell.y).is_some_and(|tile| tile.liquid)
    }

    /// Collision-checked step. Walking into a cactus hurts.
    pub fn walk(&mut self, view: &impl TileView, direction: Vec2) -> bool {
        let facing = direction.normalize_or_zero();
        if facing == Vec2::ZERO || self.hurt_time > 0 {
            return false;
        }

        let ahead = GridPos::from_world(self.position + facing * PLAYER_SPEED);
        if view
            .peek(ahead.x, ahead.y)
            .is_some_and(|tile| tile.kind == TileKind::Cactus)
        {
            self.hurt(view, 1);
            return false;
        }

        if self.swimming(view) {
            self.swim_time += 1;
            if self.swim_time % 2 == 0 {
                return false;
            }
        }

        match view.try_move(self.position, facing, PLAYER_SPEED, true) {
            Some(next) => {
                self.position = next;
                self.facing = facing;
                true
            }
            None => false,
        }
    }

    /// Apply damage unless invulnerable, then knock the player back.
    pub fn hurt(&mut self, view: &impl TileView, damage: u16) -> bool {
        if self.hurt_time > 0 || self.is_dead() {
            return false;
        }
        self.health = self.health.saturating_sub(damage.min(u8::MAX as u16) as u8);
        self.hurt_time = PLAYER_HURT_TICKS;

        let pushed = self.position - self.facing * KNOCKBACK;
        let cell = GridPos::from_world(pushed);
        if view.peek(cell.x, cell.y).is_some_and(|tile| !tile.solid) {
            self.position = pushed;
        }
        true
    }

    /// Spend energy to strike the facing tile. Returns the tile to damage.
    pub fn attack(&mut self) -> Option<GridPos> {
        if self.energy < ATTACK_ENERGY {
            return None;
        }
        self.energy -= ATTACK_ENERGY;
        Some(self.target_cell())
    }

    /// Per-tick stat upkeep: swimming drains energy, rest restores it, and
    /// high energy slowly heals.
    pub fn update(&mut self, tick: SimTick, view: &impl TileView) {
        let swimming = self.swimming(view);
        if tick.every(15) && swimming {
            self.energy = self.energy.saturating_sub(1);
        }
        if tick.every(30) {
            if self.energy > MAX_STAT / 2 {
                self.health = (self.health + 1).min(MAX_STAT);
            }
            if self.energy == 0 && swimming {
                self.hurt(view, 1);
            }
        }
        if tick.every(4) && !swimming {
            self.energy = (self.energy + 1).min(MAX_STAT);
        }
        self.hurt_time = self.hurt_time.saturating_sub(1);
    }
}
