//! The world manager.
//!
//! Owns the resident chunk set, the region store, the player and every agent.
//! Chunks follow one lifecycle: absent, then loaded from disk or generated,
//! then active until eviction saves (if modified) and drops them.

use crate::agent::{Agent, AgentEvent, AgentKind};
use crate::chunk::{local_coords, Chunk, ChunkPos};
use crate::connectors::{self, Connectors};
use crate::error::{WorldError, WorldResult};
use crate::noise::Permutation;
use crate::pathfinding::{GridPos, TileView};
use crate::player::Player;
use crate::region::RegionStore;
use crate::save::{self, SaveRecord};
use crate::storage::ChunkStorage;
use crate::terrain::TerrainGenerator;
use crate::tile::{HurtOutcome, Tile, TileKind, TileRegistry};
use crate::time::SimTime;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tilecraft_core::{coord_hash, scoped_rng, SimTick, WorldSeed};
use tracing::{debug, info, instrument, trace, warn};

/// Chunk streaming and simulation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunk radius considered visible around the player.
    pub render_range: i32,
    /// Extra chunks kept beyond the render range before eviction.
    pub evict_margin: i32,
    /// Horizontal chunk radius of the tile-update window.
    pub update_radius_x: i32,
    /// Vertical chunk radius of the tile-update window.
    pub update_radius_y: i32,
    /// Ticks between eviction passes.
    pub evict_interval: u64,
    /// Chunk radius searched for a spawn cell.
    pub spawn_radius: i32,
    /// Open region file handles kept cached.
    pub region_cache: usize,
    /// Agent placements tried when a world is created.
    pub populate_attempts: u32,
    /// Tile radius around spawn for initial agents.
    pub populate_radius: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            render_range: 2,
            evict_margin: 2,
            update_radius_x: 4,
            update_radius_y: 3,
            evict_interval: 512,
            spawn_radius: 6,
            region_cache: 8,
            populate_attempts: 6,
            populate_radius: 12,
        }
    }
}

/// Shared services handed to the world at construction.
#[derive(Debug, Clone)]
pub struct WorldContext {
    pub registry: TileRegistry,
    pub config: WorldConfig,
    /// Randomness for simulation rules. Terrain uses per-chunk scoped rngs instead.
    pub rng: StdRng,
}

impl WorldContext {
    pub fn new(registry: TileRegistry, config: WorldConfig, rng: StdRng) -> Self {
        Self {
            registry,
            config,
            rng,
        }
    }

    /// Standard tiles, default config and a reproducible rng.
    pub fn seeded(seed: u64) -> Self {
        Self::new(
            TileRegistry::standard(),
            WorldConfig::default(),
            StdRng::seed_from_u64(seed),
        )
    }
}

/// A neighbour-driven tile conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadRule {
    pub name: &'static str,
    pub target: TileKind,
    pub becomes: TileKind,
    /// 4-neighbours that trigger the conversion.
    pub influences: &'static [TileKind],
    /// Ticks between applications.
    pub period: u64,
    /// Chance per chunk per application.
    pub chance: f64,
}

/// Holes next to water or ice fill up.
pub const WATER_SEEP: SpreadRule = SpreadRule {
    name: "water_seep",
    target: TileKind::Hole,
    becomes: TileKind::Water,
    influences: &[TileKind::Water, TileKind::Ice],
    period: 8,
    chance: 1.0,
};

/// Bare dirt next to grass or flowers grows over.
pub const GRASS_SPREAD: SpreadRule = SpreadRule {
    name: "grass_spread",
    target: TileKind::Dirt,
    becomes: TileKind::Grass,
    influences: &[TileKind::Grass, TileKind::Flower],
    period: 32,
    chance: 0.125,
};

const SPREAD_RULES: [SpreadRule; 2] = [WATER_SEEP, GRASS_SPREAD];
const NEIGHBOURS: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
const AGENT_DOMAIN: u64 = 0xA6E7_5EED_0000_0000;
const POPULATE_KINDS: [AgentKind; 3] = [AgentKind::Vampire, AgentKind::Sheep, AgentKind::Pig];

pub struct World {
    ctx: WorldContext,
    seed: WorldSeed,
    dir: PathBuf,
    generator: TerrainGenerator,
    store: RegionStore,
    chunks: ChunkStorage,
    time: SimTime,
    spawn: GridPos,
    player: Player,
    agents: BTreeMap<u64, Agent>,
    next_agent_id: u64,
}

impl World {
    /// Create a fresh world in `dir`: find a spawn cell, place the player and
    /// populate the surroundings.
    #[instrument(skip(ctx, seed, dir), fields(seed = %seed, dir = %dir.as_ref().display()))]
    pub fn create(ctx: WorldContext, seed: WorldSeed, dir: impl AsRef<Path>) -> WorldResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let store = RegionStore::new(&dir, ctx.config.region_cache)?;
        let mut world = Self {
            generator: TerrainGenerator::from_seed(seed.value()),
            ctx,
            seed,
            dir,
            store,
            chunks: ChunkStorage::new(),
            time: SimTime::new(),
            spawn: GridPos::new(0, 0),
            player: Player::new(Vec2::ZERO),
            agents: BTreeMap::new(),
            next_agent_id: 0,
        };
        world.spawn = world.locate_spawn();
        world.player = Player::new(world.spawn.center());
        let placed = world.populate();
        info!(spawn = ?world.spawn, agents = placed, "World created");
        Ok(world)
    }

    /// Resume a world from `level.dat` and its region files.
    #[instrument(skip(ctx, dir), fields(dir = %dir.as_ref().display()))]
    pub fn load(ctx: WorldContext, dir: impl AsRef<Path>) -> WorldResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let record = save::read_save(&dir)?;
        let permutation = Permutation::from_table(&record.permutation)?;
        let store = RegionStore::new(&dir, ctx.config.region_cache)?;
        let seed = WorldSeed(record.seed);
        let tick = SimTick(record.ticks);

        let mut agents = BTreeMap::new();
        for agent_record in &record.agents {
            let rng = agent_rng(seed, agent_record.id, tick);
            match Agent::from_record(agent_record, rng) {
                Some(agent) => {
                    agents.insert(agent.id, agent);
                }
                None => warn!(kind = agent_record.kind, "Skipping agent of unknown kind"),
            }
        }
        let next_agent_id = record
            .next_agent_id
            .max(agents.keys().next_back().map_or(0, |id| id + 1));

        info!(%seed, ticks = record.ticks, agents = agents.len(), "World loaded");
        Ok(Self {
            ctx,
            seed,
            dir,
            generator: TerrainGenerator::new(permutation),
            store,
            chunks: ChunkStorage::new(),
            time: SimTime::at(tick),
            spawn: record.spawn,
            player: Player::from_record(&record.player),
            agents,
            next_agent_id,
        })
    }

    /// Load the world in `dir`, or create it if nothing was saved there yet.
    pub fn open_or_create(ctx: WorldContext, seed: WorldSeed, dir: impl AsRef<Path>) -> WorldResult<Self> {
        let dir = dir.as_ref();
        match save::read_save(dir) {
            Ok(_) => Self::load(ctx, dir),
            Err(WorldError::MissingSave { .. }) => Self::create(ctx, seed, dir),
            Err(err) => Err(err),
        }
    }

    /// Write every modified chunk and `level.dat`.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn save(&mut self) -> WorldResult<()> {
        let dirty = self.chunks.modified_positions();
        for pos in &dirty {
            if let Some(chunk) = self.chunks.get_mut(*pos) {
                self.store.save_chunk(chunk)?;
                chunk.mark_saved();
            }
        }
        self.store.flush()?;
        save::write_save(&self.dir, &self.save_record())?;
        info!(chunks = dirty.len(), tick = self.time.tick.0, "World saved");
        Ok(())
    }

    pub fn save_record(&self) -> SaveRecord {
        SaveRecord {
            seed: self.seed.value(),
            permutation: self.generator.permutation().to_table(),
            spawn: self.spawn,
            ticks: self.time.tick.0,
            next_agent_id: self.next_agent_id,
            player: self.player.record(),
            agents: self.agents.values().map(Agent::record).collect(),
        }
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn registry(&self) -> &TileRegistry {
        &self.ctx.registry
    }

    pub fn config(&self) -> &WorldConfig {
        &self.ctx.config
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn spawn(&self) -> GridPos {
        self.spawn
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    /// Ambient light for the current tick.
    pub fn daylight(&self) -> u8 {
        self.time.daylight()
    }

    /// Resident chunks in coordinate order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn resident_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_resident(&self, pos: ChunkPos) -> bool {
        self.chunks.contains(pos)
    }

    /// Make `pos` resident, loading it from disk or generating it.
    ///
    /// Unreadable stored chunks are regenerated.
    pub fn ensure_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        let Self {
            chunks,
            store,
            generator,
            ctx,
            seed,
            ..
        } = self;
        chunks.get_or_insert_with(pos, || {
            let mut rng = chunk_rng(*seed, pos);
            match store.load_chunk(pos, &ctx.registry, &mut rng) {
                Some(chunk) => {
                    trace!(chunk = %pos, "Chunk loaded from disk");
                    chunk
                }
                None => generator.generate_chunk(pos, &ctx.registry, &mut rng),
            }
        })
    }

    /// Tile at world coordinates, loading its chunk if needed.
    pub fn get_tile(&mut self, x: i32, y: i32) -> &Tile {
        let (lx, ly) = local_coords(x, y);
        self.ensure_chunk(ChunkPos::containing(x, y)).tile(lx, ly)
    }

    /// Tile at world coordinates if its chunk is resident. Never loads.
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        let (lx, ly) = local_coords(x, y);
        self.chunks
            .get(ChunkPos::containing(x, y))
            .map(|chunk| chunk.tile(lx, ly))
    }

    /// Replace a cell with a fresh tile of `kind`.
    pub fn set_tile(&mut self, x: i32, y: i32, kind: TileKind) {
        let tile = self.ctx.registry.instantiate(kind, &mut self.ctx.rng);
        let (lx, ly) = local_coords(x, y);
        self.ensure_chunk(ChunkPos::containing(x, y)).set_tile(lx, ly, tile);
    }

    /// Damage a cell; a destroyed tile is replaced by its parent.
    pub fn hurt_tile(&mut self, x: i32, y: i32, damage: u16) -> HurtOutcome {
        let (lx, ly) = local_coords(x, y);
        let outcome = self
            .ensure_chunk(ChunkPos::containing(x, y))
            .tile_mut(lx, ly)
            .hurt(damage);
        if let HurtOutcome::Destroyed { becomes } = outcome {
            debug!(x, y, %becomes, "Tile destroyed");
            self.set_tile(x, y, becomes);
        }
        outcome
    }

    /// Transition mask for renderers; empty when the cell is not resident.
    pub fn connectors(&self, x: i32, y: i32) -> Connectors {
        match self.tile(x, y) {
            Some(tile) => connectors::compute(tile.kind, |dx, dy| {
                self.tile(x + dx, y + dy).map(|neighbour| neighbour.kind)
            }),
            None => Connectors::empty(),
        }
    }

    /// Apply `rule` once inside the chunk at `pos`.
    ///
    /// Scans row-major for the rule's target and converts the first one with
    /// an influencing 4-neighbour (neighbours in other resident chunks count).
    /// Returns false and leaves the chunk untouched when nothing matched.
    pub fn update_tiles(&mut self, pos: ChunkPos, rule: &SpreadRule) -> bool {
        let Some(chunk) = self.chunks.get(pos) else {
            return false;
        };
        let hit = chunk.iter().find_map(|(lx, ly, tile)| {
            if tile.kind != rule.target {
                return None;
            }
            let (wx, wy) = pos.world_coords(lx, ly);
            NEIGHBOURS
                .iter()
                .any(|&(dx, dy)| {
                    self.tile(wx + dx, wy + dy)
                        .is_some_and(|n| rule.influences.contains(&n.kind))
                })
                .then_some((lx, ly))
        });
        let Some((lx, ly)) = hit else {
            return false;
        };
        let tile = self.ctx.registry.instantiate(rule.becomes, &mut self.ctx.rng);
        if let Some(chunk) = self.chunks.get_mut(pos) {
            chunk.set_tile(lx, ly, tile);
        }
        trace!(rule = rule.name, chunk = %pos, lx, ly, "Tile rule applied");
        true
    }

    /// Chunk positions of the update window around the player, row by row.
    pub fn update_window(&self) -> Vec<ChunkPos> {
        let center = self.player.chunk();
        let (rx, ry) = (self.ctx.config.update_radius_x, self.ctx.config.update_radius_y);
        (center.y - ry..=center.y + ry)
            .flat_map(|cy| (center.x - rx..=center.x + rx).map(move |cx| ChunkPos::new(cx, cy)))
            .collect()
    }

    /// Advance the simulation to `tick`.
    pub fn update(&mut self, tick: SimTick) -> WorldResult<()> {
        self.time = SimTime::at(tick);

        let window = self.update_window();
        for pos in &window {
            self.ensure_chunk(*pos);
        }
        for rule in &SPREAD_RULES {
            if !tick.every(rule.period) {
                continue;
            }
            for pos in &window {
                if rule.chance >= 1.0 || self.ctx.rng.gen_bool(rule.chance) {
                    self.update_tiles(*pos, rule);
                }
            }
        }

        let mut player = self.player.clone();
        player.update(tick, &*self);
        self.player = player;

        self.step_agents(tick);

        if tick.every(self.ctx.config.evict_interval) {
            self.evict()?;
        }
        Ok(())
    }

    fn step_agents(&mut self, tick: SimTick) {
        let mut agents = std::mem::take(&mut self.agents);
        let view = self.player.view();
        let mut events = Vec::new();
        for agent in agents.values_mut() {
            if !self.chunks.contains(agent.chunk()) {
                continue;
            }
            if let Some(event) = agent.update(tick, &*self, &view) {
                events.push(event);
            }
        }
        agents.retain(|id, agent| {
            if agent.is_dead() {
                debug!(id, kind = %agent.kind, "Agent died");
            }
            !agent.is_dead()
        });
        self.agents = agents;

        for event in events {
            match event {
                AgentEvent::AttackPlayer { damage } => {
                    let mut player = self.player.clone();
                    if player.hurt(&*self, damage) {
                        debug!(damage, health = player.health, "Player hurt");
                    }
                    self.player = player;
                }
            }
        }
    }

    /// Save and drop chunks too far from the player. Returns how many were evicted.
    ///
    /// A chunk whose save fails stays resident and the error is returned.
    #[instrument(skip(self), fields(player_chunk = %self.player.chunk()))]
    pub fn evict(&mut self) -> WorldResult<usize> {
        let radius = self.ctx.config.render_range + self.ctx.config.evict_margin;
        let far = self.chunks.positions_beyond(self.player.chunk(), radius);
        let mut evicted = 0;
        for pos in far {
            if let Some(chunk) = self.chunks.get(pos) {
                if chunk.is_modified() {
                    self.store.save_chunk(chunk)?;
                }
            }
            self.chunks.remove(pos);
            evicted += 1;
        }
        if evicted > 0 {
            info!(evicted, resident = self.chunks.len(), "Evicted distant chunks");
        }
        Ok(evicted)
    }

    /// Collision-checked player step.
    pub fn move_player(&mut self, direction: Vec2) -> bool {
        let mut player = self.player.clone();
        let moved = player.walk(&*self, direction);
        self.player = player;
        moved
    }

    /// Player strikes the tile it faces, and any agent standing there.
    pub fn player_attack(&mut self) -> Option<HurtOutcome> {
        let target = self.player.attack()?;
        let damage = self.ctx.rng.gen_range(1..=3);
        for agent in self.agents.values_mut() {
            if agent.cell() == target {
                agent.hurt(damage);
            }
        }
        Some(self.hurt_tile(target.x, target.y, damage))
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent(&self, id: u64) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: u64) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Place a new agent on a walkable cell. Returns its id.
    pub fn spawn_agent(&mut self, kind: AgentKind, position: Vec2) -> WorldResult<u64> {
        let invalid = || WorldError::InvalidCoordinate {
            x: position.x,
            y: position.y,
        };
        if !position.is_finite() {
            return Err(invalid());
        }
        let cell = GridPos::from_world(position);
        if !self.get_tile(cell.x, cell.y).is_walkable() {
            return Err(invalid());
        }
        let id = self.next_agent_id;
        self.next_agent_id += 1;
        let rng = agent_rng(self.seed, id, self.time.tick);
        self.agents.insert(id, Agent::new(id, kind, position, rng));
        debug!(id, %kind, ?cell, "Agent spawned");
        Ok(id)
    }

    pub fn despawn(&mut self, id: u64) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Try to place random agents around spawn. Returns how many were placed.
    pub fn populate(&mut self) -> usize {
        let radius = self.ctx.config.populate_radius;
        let mut placed = 0;
        for _ in 0..self.ctx.config.populate_attempts {
            let cell = self.spawn.offset(
                self.ctx.rng.gen_range(-radius..=radius),
                self.ctx.rng.gen_range(-radius..=radius),
            );
            if !self.get_tile(cell.x, cell.y).is_walkable() {
                continue;
            }
            let kind = POPULATE_KINDS[self.ctx.rng.gen_range(0..POPULATE_KINDS.len())];
            if self.spawn_agent(kind, cell.center()).is_ok() {
                placed += 1;
            }
        }
        placed
    }

    /// First walkable cell in the spawn area, scanning chunks row by row.
    fn locate_spawn(&mut self) -> GridPos {
        let r = self.ctx.config.spawn_radius;
        for cy in -r..r {
            for cx in -r..r {
                let pos = ChunkPos::new(cx, cy);
                let found = self
                    .ensure_chunk(pos)
                    .iter()
                    .find(|(_, _, tile)| tile.is_walkable())
                    .map(|(lx, ly, _)| pos.world_coords(lx, ly));
                if let Some((x, y)) = found {
                    return GridPos::new(x, y);
                }
            }
        }
        warn!(radius = r, "No walkable spawn cell found; using the origin");
        GridPos::new(0, 0)
    }
}

impl TileView for World {
    fn peek(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile(x, y)
    }
}

/// Per-chunk rng so generation does not depend on load order.
pub fn chunk_rng(seed: WorldSeed, pos: ChunkPos) -> StdRng {
    scoped_rng(seed.value(), coord_hash(pos.x, pos.y), SimTick::ZERO)
}

fn agent_rng(seed: WorldSeed, id: u64, tick: SimTick) -> StdRng {
    scoped_rng(seed.value(), AGENT_DOMAIN ^ id.wrapping_mul(0x9E37_79B9_7F4A_7C15), tick)
}
