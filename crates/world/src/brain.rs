//! Agent decision making.
//!
//! One state machine for every agent; the [`Aggression`] disposition decides
//! which transitions are live. The brain never moves the agent itself: each
//! call to [`Brain::think`] yields at most one direction, and the caller runs
//! that through the collision-checked move.

use crate::pathfinding::{find_path, valid_position, water_between, Connectivity, GridPos, TileView};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Ticks before an agent first considers wandering.
pub const FIRST_WANDER_DELAY: u32 = 30;
/// Ticks between wander attempts once settled.
pub const WANDER_COOLDOWN: u32 = 60;
/// Attempts at picking a valid wander target.
pub const WANDER_ATTEMPTS: u32 = 10;
/// How far a player may be for a hostile agent to notice it.
pub const AGGRO_RANGE: f32 = 4.5;
/// Close enough to the player to stop and wait.
pub const TARGET_DISTANCE: f32 = 0.5;
/// A waypoint counts as reached inside this radius.
pub const WAYPOINT_RADIUS: f32 = 0.5;
/// Chase paths are refreshed at least this often.
pub const CHASE_REPATH_TICKS: u32 = 10;
/// How long a neutral agent stays provoked after last seeing the player move.
pub const NEUTRAL_MEMORY_TICKS: u32 = 90;
/// Pause between a neutral agent calming down and resuming its wander.
pub const NEUTRAL_SETTLE_TICKS: u32 = 20;

/// Observable FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrainState {
    Idle,
    Wandering,
    Chasing,
    Waiting,
}

impl BrainState {
    /// States that act on every tick instead of every second tick.
    pub fn is_active(self) -> bool {
        matches!(self, BrainState::Wandering | BrainState::Chasing)
    }
}

/// How an agent reacts to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggression {
    /// Never chases.
    Passive,
    /// Chases only while provoked.
    Neutral,
    /// Chases whenever the player is in range.
    Hostile,
}

/// What the brain sees of the player this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerView {
    pub position: Vec2,
}

/// Serializable brain state. The cached path and rng are rebuilt on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrainSnapshot {
    pub state: BrainState,
    pub wander_timer: u32,
    pub path_timer: u32,
    /// Thinks left before a failed chase may be retried.
    pub chase_cooldown: u32,
    pub memory: u32,
    pub settle: u32,
    pub target: Option<GridPos>,
}

#[derive(Debug, Clone)]
pub struct Brain {
    state: BrainState,
    aggression: Aggression,
    connectivity: Connectivity,
    wander_timer: u32,
    path_timer: u32,
    chase_cooldown: u32,
    memory: u32,
    settle: u32,
    target: Option<GridPos>,
    /// Remaining waypoints, next one first.
    path: Vec<GridPos>,
    last_player: Option<Vec2>,
    rng: StdRng,
}

impl Brain {
    pub fn new(aggression: Aggression, connectivity: Connectivity, rng: StdRng) -> Self {
        Self {
            state: BrainState::Idle,
            aggression,
            connectivity,
            wander_timer: FIRST_WANDER_DELAY,
            path_timer: 0,
            chase_cooldown: 0,
            memory: 0,
            settle: 0,
            target: None,
            path: Vec::new(),
            last_player: None,
            rng,
        }
    }

    pub fn restore(
        aggression: Aggression,
        connectivity: Connectivity,
        snapshot: BrainSnapshot,
        rng: StdRng,
    ) -> Self {
        Self {
            state: snapshot.state,
            wander_timer: snapshot.wander_timer,
            path_timer: snapshot.path_timer,
            chase_cooldown: snapshot.chase_cooldown,
            memory: snapshot.memory,
            settle: snapshot.settle,
            target: snapshot.target,
            ..Self::new(aggression, connectivity, rng)
        }
    }

    pub fn snapshot(&self) -> BrainSnapshot {
        BrainSnapshot {
            state: self.state,
            wander_timer: self.wander_timer,
            path_timer: self.path_timer,
            chase_cooldown: self.chase_cooldown,
            memory: self.memory,
            settle: self.settle,
            target: self.target,
        }
    }

    pub fn state(&self) -> BrainState {
        self.state
    }

    pub fn aggression(&self) -> Aggression {
        self.aggression
    }

    /// Waypoints still to visit.
    pub fn path(&self) -> &[GridPos] {
        &self.path
    }

    pub fn target(&self) -> Option<GridPos> {
        self.target
    }

    /// True while the agent would attack on contact.
    pub fn is_hostile(&self) -> bool {
        match self.aggression {
            Aggression::Passive => false,
            Aggression::Neutral => self.memory > 0,
            Aggression::Hostile => true,
        }
    }

    /// Advance the FSM one step and return the direction to move, if any.
    pub fn think(&mut self, view: &impl TileView, position: Vec2, player: &PlayerView) -> Option<Vec2> {
        let before = self.state;
        let direction = match self.aggression {
            Aggression::Passive => self.think_passive(view, position),
            Aggression::Hostile => self.think_hostile(view, position, player),
            Aggression::Neutral => self.think_neutral(view, position, player),
        };
        if before != self.state {
            trace!(from = ?before, to = ?self.state, "brain transition");
        }
        direction
    }

    fn think_neutral(&mut self, view: &impl TileView, position: Vec2, player: &PlayerView) -> Option<Vec2> {
        let in_range = position.distance(player.position) <= AGGRO_RANGE;
        let moved = self.last_player.is_some_and(|last| last != player.position);
        self.last_player = Some(player.position);
        if in_range && moved {
            self.memory = NEUTRAL_MEMORY_TICKS;
            self.settle = 0;
        }

        if self.memory > 0 {
            self.memory -= 1;
            if self.memory > 0 {
                return self.think_hostile(view, position, player);
            }
            self.enter(BrainState::Waiting);
            self.settle = NEUTRAL_SETTLE_TICKS;
            return None;
        }

        if self.settle > 0 {
            self.settle -= 1;
            if self.settle == 0 {
                self.enter(BrainState::Idle);
                self.wander_timer = WANDER_COOLDOWN;
            }
            return None;
        }

        self.think_passive(view, position)
    }

    fn think_hostile(&mut self, view: &impl TileView, position: Vec2, player: &PlayerView) -> Option<Vec2> {
        let distance = position.distance(player.position);
        let here = GridPos::from_world(position);
        let player_cell = GridPos::from_world(player.position);
        let stimulus = distance <= AGGRO_RANGE && !water_between(view, here, player_cell);
        self.chase_cooldown = self.chase_cooldown.saturating_sub(1);

        match self.state {
            BrainState::Idle | BrainState::Wandering if stimulus && self.chase_cooldown == 0 => {
                self.enter(BrainState::Chasing);
                self.path_timer = CHASE_REPATH_TICKS;
                self.chase(view, position, player)
            }
            BrainState::Idle | BrainState::Wandering => self.think_passive(view, position),
            BrainState::Chasing | BrainState::Waiting if !stimulus => {
                self.enter(BrainState::Idle);
                self.wander_timer = WANDER_COOLDOWN;
                None
            }
            BrainState::Chasing if distance <= TARGET_DISTANCE => {
                self.enter(BrainState::Waiting);
                None
            }
            BrainState::Chasing => self.chase(view, position, player),
            BrainState::Waiting if distance > TARGET_DISTANCE => {
                self.enter(BrainState::Chasing);
                self.path_timer = CHASE_REPATH_TICKS;
                self.chase(view, position, player)
            }
            BrainState::Waiting => None,
        }
    }

    fn chase(&mut self, view: &impl TileView, position: Vec2, player: &PlayerView) -> Option<Vec2> {
        let here = GridPos::from_world(position);
        let player_cell = GridPos::from_world(player.position);
        if here == player_cell {
            self.path.clear();
            return Some(player.position - position);
        }

        self.path_timer += 1;
        let stale = self.path_timer >= CHASE_REPATH_TICKS
            || self.path.is_empty()
            || !self.path.first().is_some_and(|next| view.is_passable(*next));
        if stale {
            self.path_timer = 0;
            self.path = find_path(view, here, player_cell, self.connectivity);
            if self.path.is_empty() {
                return self.abandon_chase(view, position);
            }
        }
        self.follow_path(position)
    }

    /// No route to the player: back off for a while and keep wandering.
    fn abandon_chase(&mut self, view: &impl TileView, position: Vec2) -> Option<Vec2> {
        trace!("chase path not found");
        self.chase_cooldown = CHASE_REPATH_TICKS;
        let resume = if self.target.is_some() {
            BrainState::Wandering
        } else {
            BrainState::Idle
        };
        self.path.clear();
        self.enter(resume);
        self.think_passive(view, position)
    }

    fn think_passive(&mut self, view: &impl TileView, position: Vec2) -> Option<Vec2> {
        match self.state {
            BrainState::Wandering => self.wander(view, position),
            BrainState::Idle => {
                self.wander_timer = self.wander_timer.saturating_sub(1);
                if self.wander_timer > 0 {
                    return None;
                }
                self.wander_timer = WANDER_COOLDOWN;
                let here = GridPos::from_world(position);
                self.target = self.pick_wander_target(view, here);
                if self.target.is_none() {
                    return None;
                }
                self.path.clear();
                self.enter(BrainState::Wandering);
                self.wander(view, position)
            }
            // Only reachable through a neutral agent losing interest mid-chase.
            BrainState::Chasing | BrainState::Waiting => {
                self.enter(BrainState::Idle);
                None
            }
        }
    }

    fn wander(&mut self, view: &impl TileView, position: Vec2) -> Option<Vec2> {
        let Some(target) = self.target else {
            self.enter(BrainState::Idle);
            return None;
        };
        if position.distance(target.center()) < WAYPOINT_RADIUS {
            self.target = None;
            self.path.clear();
            self.enter(BrainState::Idle);
            return None;
        }

        let next_invalid = !self.path.first().is_some_and(|next| view.is_passable(*next));
        if next_invalid {
            self.path = find_path(view, GridPos::from_world(position), target, self.connectivity);
            if self.path.is_empty() {
                // Unreachable or no longer valid; pick something else next time.
                self.target = None;
                self.enter(BrainState::Idle);
                return None;
            }
        }
        let direction = self.follow_path(position);
        if direction.is_none() {
            self.target = None;
            self.enter(BrainState::Idle);
        }
        direction
    }

    /// Direction toward the next waypoint, dropping it once reached.
    fn follow_path(&mut self, position: Vec2) -> Option<Vec2> {
        while let Some(next) = self.path.first().copied() {
            let offset = next.center() - position;
            if offset.length() >= WAYPOINT_RADIUS {
                return Some(offset);
            }
            self.path.remove(0);
        }
        None
    }

    fn pick_wander_target(&mut self, view: &impl TileView, here: GridPos) -> Option<GridPos> {
        const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        for _ in 0..WANDER_ATTEMPTS {
            let (dx, dy) = DIRECTIONS[self.rng.gen_range(0..DIRECTIONS.len())];
            let steps = self.rng.gen_range(2..=4);
            let candidate = here.offset(dx * steps, dy * steps);
            if valid_position(view, candidate, self.connectivity) {
                return Some(candidate);
            }
        }
        None
    }

    fn enter(&mut self, state: BrainState) {
        if state != BrainState::Chasing && state != BrainState::Wandering {
            self.path.clear();
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Tile, TileKind, TileRegistry};
    use rand::SeedableRng;
    use std::cell::Cell;

    struct Field {
        tiles: Vec<Tile>,
    }

    const SIDE: i32 = 24;

    impl Field {
        fn open() -> Self {
            let grass = Tile::from_proto(TileRegistry::standard().proto(TileKind::Grass), 0);
            Self {
                tiles: vec![grass; (SIDE * SIDE) as usize],
            }
        }

        fn set(&mut self, x: i32, y: i32, kind: TileKind) {
            self.tiles[(y * SIDE + x) as usize] =
                Tile::from_proto(TileRegistry::standard().proto(kind), 0);
        }
    }

    impl TileView for Field {
        fn peek(&self, x: i32, y: i32) -> Option<&Tile> {
            if x < 0 || y < 0 || x >= SIDE || y >= SIDE {
                return None;
            }
            self.tiles.get((y * SIDE + x) as usize)
        }
    }

    /// Field that counts every tile lookup.
    struct Counting {
        field: Field,
        peeks: Cell<usize>,
    }

    impl Counting {
        fn new(field: Field) -> Self {
            Self {
                field,
                peeks: Cell::new(0),
            }
        }

        fn peeks_during<T>(&self, f: impl FnOnce(&Self) -> T) -> usize {
            let before = self.peeks.get();
            f(self);
            self.peeks.get() - before
        }
    }

    impl TileView for Counting {
        fn peek(&self, x: i32, y: i32) -> Option<&Tile> {
            self.peeks.set(self.peeks.get() + 1);
            self.field.peek(x, y)
        }
    }

    fn brain(aggression: Aggression) -> Brain {
        Brain::new(aggression, Connectivity::Four, StdRng::seed_from_u64(7))
    }

    fn far_player() -> PlayerView {
        PlayerView {
            position: Vec2::new(0.5, 0.5),
        }
    }

    #[test]
    fn passive_waits_then_wanders() {
        let field = Field::open();
        let mut brain = brain(Aggression::Passive);
        let position = Vec2::new(12.5, 12.5);
        for _ in 0..FIRST_WANDER_DELAY - 1 {
            assert_eq!(brain.think(&field, position, &far_player()), None);
            assert_eq!(brain.state(), BrainState::Idle);
        }
        let direction = brain.think(&field, position, &far_player());
        assert_eq!(brain.state(), BrainState::Wandering);
        assert!(direction.is_some());
        let target = brain.target().unwrap();
        let here = GridPos::new(12, 12);
        assert!((2..=4).contains(&here.manhattan(target)));
        assert!(target.x == here.x || target.y == here.y);
    }

    #[test]
    fn wanderer_returns_to_idle_on_arrival() {
        let field = Field::open();
        let mut brain = brain(Aggression::Passive);
        let mut position = Vec2::new(12.5, 12.5);
        for _ in 0..FIRST_WANDER_DELAY {
            brain.think(&field, position, &far_player());
        }
        let target = brain.target().unwrap();
        for _ in 0..200 {
            match brain.think(&field, position, &far_player()) {
                Some(direction) => position += direction.normalize() * 0.1,
                None => break,
            }
        }
        assert_eq!(brain.state(), BrainState::Idle);
        assert!(position.distance(target.center()) < 1.0);
    }

    #[test]
    fn passive_ignores_the_player() {
        let field = Field::open();
        let mut brain = brain(Aggression::Passive);
        let player = PlayerView {
            position: Vec2::new(11.5, 12.5),
        };
        for _ in 0..10 {
            brain.think(&field, Vec2::new(12.5, 12.5), &player);
            assert_ne!(brain.state(), BrainState::Chasing);
        }
        assert!(!brain.is_hostile());
    }

    #[test]
    fn hostile_chases_then_waits() {
        let field = Field::open();
        let mut brain = brain(Aggression::Hostile);
        let player = PlayerView {
            position: Vec2::new(9.5, 12.5),
        };
        let direction = brain.think(&field, Vec2::new(12.5, 12.5), &player).unwrap();
        assert_eq!(brain.state(), BrainState::Chasing);
        assert!(direction.x < 0.0);

        brain.think(&field, Vec2::new(9.7, 12.5), &player);
        assert_eq!(brain.state(), BrainState::Waiting);

        let moved = PlayerView {
            position: Vec2::new(7.5, 12.5),
        };
        brain.think(&field, Vec2::new(9.7, 12.5), &moved);
        assert_eq!(brain.state(), BrainState::Chasing);
    }

    #[test]
    fn hostile_loses_interest_out_of_range() {
        let field = Field::open();
        let mut brain = brain(Aggression::Hostile);
        let near = PlayerView {
            position: Vec2::new(10.5, 12.5),
        };
        brain.think(&field, Vec2::new(12.5, 12.5), &near);
        assert_eq!(brain.state(), BrainState::Chasing);
        brain.think(&field, Vec2::new(12.5, 12.5), &far_player());
        assert_eq!(brain.state(), BrainState::Idle);
        assert!(brain.path().is_empty());
    }

    #[test]
    fn unreachable_player_falls_back_to_wandering() {
        let mut field = Field::open();
        for y in 0..SIDE {
            field.set(8, y, TileKind::Stone);
        }
        let mut brain = brain(Aggression::Hostile);
        let player = PlayerView {
            position: Vec2::new(6.5, 12.5),
        };
        let mut states = Vec::new();
        for _ in 0..400 {
            brain.think(&field, Vec2::new(10.5, 12.5), &player);
            states.push(brain.state());
        }
        assert!(states.contains(&BrainState::Wandering), "{states:?}");
        assert!(!states.contains(&BrainState::Chasing));
    }

    #[test]
    fn failed_chase_waits_before_retrying() {
        let mut field = Field::open();
        for y in 0..SIDE {
            field.set(8, y, TileKind::Stone);
        }
        let view = Counting::new(field);
        let mut brain = brain(Aggression::Hostile);
        let position = Vec2::new(10.5, 12.5);
        let player = PlayerView {
            position: Vec2::new(6.5, 12.5),
        };
        let first = view.peeks_during(|view| brain.think(view, position, &player));
        let quiet: Vec<usize> = (1..CHASE_REPATH_TICKS)
            .map(|_| view.peeks_during(|view| brain.think(view, position, &player)))
            .collect();
        let retry = view.peeks_during(|view| brain.think(view, position, &player));

        assert!(quiet.iter().all(|&peeks| peeks < first), "{first} {quiet:?}");
        assert!(retry > *quiet.iter().max().unwrap(), "{retry} {quiet:?}");
    }

    #[test]
    fn chase_path_is_cached_between_repaths() {
        let mut view = Counting::new(Field::open());
        let mut brain = brain(Aggression::Hostile);
        let position = Vec2::new(12.5, 12.5);
        let player = PlayerView {
            position: Vec2::new(16.5, 14.5),
        };

        let first = view.peeks_during(|view| brain.think(view, position, &player));
        assert_eq!(brain.state(), BrainState::Chasing);
        let path = brain.path().to_vec();
        assert_eq!(path.last(), Some(&GridPos::new(16, 14)));

        let cached: Vec<usize> = (1..CHASE_REPATH_TICKS)
            .map(|_| view.peeks_during(|view| brain.think(view, position, &player)))
            .collect();
        assert_eq!(brain.path(), path.as_slice());
        assert!(cached.windows(2).all(|pair| pair[0] == pair[1]), "{cached:?}");
        assert!(cached[0] < first);

        let repath = view.peeks_during(|view| brain.think(view, position, &player));
        assert!(repath > cached[0]);
        assert_eq!(brain.path(), path.as_slice());

        // Blocking the next waypoint forces a new route straight away.
        let blocked = path[0];
        view.field.set(blocked.x, blocked.y, TileKind::Stone);
        let rerouted = view.peeks_during(|view| brain.think(view, position, &player));
        assert!(rerouted > cached[0]);
        assert_eq!(brain.state(), BrainState::Chasing);
        assert!(!brain.path().is_empty());
        assert!(!brain.path().contains(&blocked));
        assert_eq!(brain.path().last(), Some(&GridPos::new(16, 14)));
    }

    #[test]
    fn water_blocks_the_stimulus() {
        let mut field = Field::open();
        for y in 0..SIDE {
            field.set(11, y, TileKind::Water);
        }
        let mut brain = brain(Aggression::Hostile);
        let player = PlayerView {
            position: Vec2::new(9.5, 12.5),
        };
        brain.think(&field, Vec2::new(12.5, 12.5), &player);
        assert_ne!(brain.state(), BrainState::Chasing);
    }

    #[test]
    fn neutral_is_provoked_by_movement_and_settles() {
        let field = Field::open();
        let mut brain = brain(Aggression::Neutral);
        let position = Vec2::new(12.5, 12.5);
        let still = PlayerView {
            position: Vec2::new(10.5, 12.5),
        };
        brain.think(&field, position, &still);
        brain.think(&field, position, &still);
        assert!(!brain.is_hostile());

        let stepped = PlayerView {
            position: Vec2::new(10.6, 12.5),
        };
        brain.think(&field, position, &stepped);
        assert!(brain.is_hostile());
        assert_eq!(brain.state(), BrainState::Chasing);

        for _ in 1..NEUTRAL_MEMORY_TICKS {
            brain.think(&field, position, &stepped);
        }
        assert!(!brain.is_hostile());
        assert_eq!(brain.state(), BrainState::Waiting);

        for _ in 0..NEUTRAL_SETTLE_TICKS {
            brain.think(&field, position, &stepped);
        }
        assert_eq!(brain.state(), BrainState::Idle);
    }

    #[test]
    fn snapshot_restores_counters() {
        let field = Field::open();
        let mut original = brain(Aggression::Passive);
        for _ in 0..5 {
            original.think(&field, Vec2::new(12.5, 12.5), &far_player());
        }
        let snapshot = original.snapshot();
        let restored = Brain::restore(
            Aggression::Passive,
            Connectivity::Four,
            snapshot,
            StdRng::seed_from_u64(1),
        );
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(snapshot.wander_timer, FIRST_WANDER_DELAY - 5);
    }
}
