//! Autonomous agents (animals and monsters).
//!
//! Kinds are data: each maps to an [`AgentDescriptor`]. Behaviour lives in
//! [`Brain`]; this module owns the body (position, health, movement).

use crate::brain::{Aggression, Brain, BrainSnapshot, BrainState, PlayerView};
use crate::chunk::ChunkPos;
use crate::pathfinding::{Connectivity, GridPos, TileView};
use glam::Vec2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tilecraft_core::SimTick;

/// Invulnerability ticks after taking damage.
pub const HURT_TICKS: u32 = 15;
/// Hostile agents touching the player within this distance attack.
pub const ATTACK_REACH: f32 = 0.6;

/// Kinds of agents. Discriminants are the persisted ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AgentKind {
    Vampire = 0,
    Sheep = 1,
    Pig = 2,
    Zombie = 3,
}

/// Per-kind tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentDescriptor {
    /// Tiles per tick.
    pub speed: f32,
    pub max_health: u16,
    pub aggression: Aggression,
    pub connectivity: Connectivity,
    pub can_swim: bool,
    /// Sprite sheet key for renderers.
    pub sprite_set: &'static str,
    pub attack_damage: u16,
}

impl AgentKind {
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Vampire,
        AgentKind::Sheep,
        AgentKind::Pig,
        AgentKind::Zombie,
    ];

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Canonical lowercase key for configs and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            AgentKind::Vampire => "vampire",
            AgentKind::Sheep => "sheep",
            AgentKind::Pig => "pig",
            AgentKind::Zombie => "zombie",
        }
    }

    /// Parse a kind from its key (case-insensitive).
    pub fn parse(input: &str) -> Option<Self> {
        let key = input.trim().to_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }

    pub const fn descriptor(self) -> AgentDescriptor {
        match self {
            AgentKind::Sheep => AgentDescriptor {
                speed: 0.028,
                max_health: 5,
                aggression: Aggression::Passive,
                connectivity: Connectivity::Four,
                can_swim: false,
                sprite_set: "sheep",
                attack_damage: 0,
            },
            AgentKind::Pig => AgentDescriptor {
                speed: 0.030,
                max_health: 5,
                aggression: Aggression::Passive,
                connectivity: Connectivity::Four,
                can_swim: true,
                sprite_set: "pig",
                attack_damage: 0,
            },
            AgentKind::Zombie => AgentDescriptor {
                speed: 0.030,
                max_health: 10,
                aggression: Aggression::Neutral,
                connectivity: Connectivity::Four,
                can_swim: false,
                sprite_set: "zombie",
                attack_damage: 1,
            },
            AgentKind::Vampire => AgentDescriptor {
                speed: 0.040,
                max_health: 8,
                aggression: Aggression::Hostile,
                connectivity: Connectivity::Eight,
                can_swim: false,
                sprite_set: "vampire",
                attack_damage: 1,
            },
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects an agent asks the world to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    AttackPlayer { damage: u16 },
}

/// Persisted form of an [`Agent`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: u64,
    pub kind: u8,
    pub position: Vec2,
    pub facing: Vec2,
    pub health: u16,
    pub hurt_time: u32,
    pub swim_time: u32,
    pub brain: BrainSnapshot,
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: u64,
    pub kind: AgentKind,
    pub position: Vec2,
    pub facing: Vec2,
    pub health: u16,
    pub hurt_time: u32,
    pub swim_time: u32,
    /// Distance covered, for walk animations.
    pub walk_distance: f32,
    brain: Brain,
}

impl Agent {
    pub fn new(id: u64, kind: AgentKind, position: Vec2, rng: StdRng) -> Self {
        let descriptor = kind.descriptor();
        Self {
            id,
            kind,
            position,
            facing: Vec2::Y,
            health: descriptor.max_health,
            hurt_time: 0,
            swim_time: 0,
            walk_distance: 0.0,
            brain: Brain::new(descriptor.aggression, descriptor.connectivity, rng),
        }
    }

    /// Rebuild from a saved record; `None` for an unknown kind id.
    pub fn from_record(record: &AgentRecord, rng: StdRng) -> Option<Self> {
        let kind = AgentKind::from_id(record.kind)?;
        let descriptor = kind.descriptor();
        Some(Self {
            id: record.id,
            kind,
            position: record.position,
            facing: record.facing,
            health: record.health.min(descriptor.max_health),
            hurt_time: record.hurt_time,
            swim_time: record.swim_time,
            walk_distance: 0.0,
            brain: Brain::restore(descriptor.aggression, descriptor.connectivity, record.brain, rng),
        })
    }

    pub fn record(&self) -> AgentRecord {
        AgentRecord {
            id: self.id,
            kind: self.kind.id(),
            position: self.position,
            facing: self.facing,
            health: self.health,
            hurt_time: self.hurt_time,
            swim_time: self.swim_time,
            brain: self.brain.snapshot(),
        }
    }

    pub fn descriptor(&self) -> AgentDescriptor {
        self.kind.descriptor()
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn state(&self) -> BrainState {
        self.brain.state()
    }

    pub fn cell(&self) -> GridPos {
        GridPos::from_world(self.position)
    }

    pub fn chunk(&self) -> ChunkPos {
        let cell = self.cell();
        ChunkPos::containing(cell.x, cell.y)
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    /// Apply damage unless still invulnerable. Returns true if it landed.
    pub fn hurt(&mut self, damage: u16) -> bool {
        if self.hurt_time > 0 || self.is_dead() {
            return false;
        }
        self.health = self.health.saturating_sub(damage);
        self.hurt_time = HURT_TICKS;
        true
    }

    /// One simulation step: think, move at most once, maybe attack.
    ///
    /// Brains in an active state think every tick; idle and waiting brains
    /// only on even ticks.
    pub fn update(
        &mut self,
        tick: SimTick,
        view: &impl TileView,
        player: &PlayerView,
    ) -> Option<AgentEvent> {
        if self.is_dead() {
            return None;
        }
        let blocked = self.hurt_time > 0;
        self.hurt_time = self.hurt_time.saturating_sub(1);

        if self.brain.state().is_active() || tick.every(2) {
            if let Some(direction) = self.brain.think(view, self.position, player) {
                if !blocked {
                    self.walk(view, direction);
                }
            }
        }

        let reach = self.position.distance(player.position) < ATTACK_REACH;
        if reach && self.brain.is_hostile() {
            let damage = self.descriptor().attack_damage;
            return Some(AgentEvent::AttackPlayer { damage });
        }
        None
    }

    /// Collision-checked step in `direction`. Returns true if the agent moved.
    pub fn walk(&mut self, view: &impl TileView, direction: Vec2) -> bool {
        let descriptor = self.descriptor();
        let facing = direction.normalize_or_zero();
        if facing == Vec2::ZERO {
            return false;
        }
        self.facing = facing;

        let cell = self.cell();
        let swimming = view.peek(cell.x, cell.y).is_some_and(|tile| tile.liquid);
        if swimming && descriptor.can_swim {
            self.swim_time += 1;
            if self.swim_time % 2 == 0 {
                return false;
            }
        }

        match view.try_move(self.position, direction, descriptor.speed, descriptor.can_swim) {
            Some(next) => {
                self.walk_distance += next.distance(self.position);
                self.position = next;
                true
            }
            None => false,
        }
    }
}
