//! Determinism worldtest.
//!
//! Focus areas:
//! - Same seed produces identical chunks regardless of generation order
//! - Biome classification is seed-driven
//! - Two worlds stepped with the same inputs produce identical tick traces

use glam::Vec2;
use serde::Serialize;
use tilecraft_core::WorldSeed;
use tilecraft_testkit::{assert_traces_match, run_tick_trace, write_trace, ScratchDir, TickFrame};
use tilecraft_world::{
    chunk_rng, BrainState, ChunkPos, TerrainGenerator, TileId, TileRegistry, World, WorldContext,
    CHUNK_AREA,
};

const WORLD_SEED: u64 = 11_223_344_556_677;
const CHUNK_RADIUS: i32 = 4;
const TRACE_TICKS: u64 = 240;

fn positions() -> Vec<ChunkPos> {
    (-CHUNK_RADIUS..=CHUNK_RADIUS)
        .flat_map(|cy| (-CHUNK_RADIUS..=CHUNK_RADIUS).map(move |cx| ChunkPos::new(cx, cy)))
        .collect()
}

fn generate(generator: &TerrainGenerator, pos: ChunkPos) -> [TileId; CHUNK_AREA] {
    let registry = TileRegistry::standard();
    let mut rng = chunk_rng(WorldSeed(WORLD_SEED), pos);
    generator.generate_chunk(pos, &registry, &mut rng).tile_ids()
}

#[test]
fn generation_is_order_independent() {
    let generator = TerrainGenerator::from_seed(WORLD_SEED);
    let forward: Vec<_> = positions()
        .into_iter()
        .map(|pos| (pos, generate(&generator, pos)))
        .collect();

    // Fresh generator, reversed order.
    let generator = TerrainGenerator::from_seed(WORLD_SEED);
    let mut backward: Vec<_> = positions()
        .into_iter()
        .rev()
        .map(|pos| (pos, generate(&generator, pos)))
        .collect();
    backward.reverse();

    for ((pos, a), (_, b)) in forward.iter().zip(&backward) {
        assert_eq!(a, b, "chunk {pos} differs between generation orders");
    }
    println!("{} chunks identical across orders", forward.len());
}

#[test]
fn biome_classification_depends_only_on_seed() {
    let a = TerrainGenerator::from_seed(WORLD_SEED);
    let b = TerrainGenerator::from_seed(WORLD_SEED);
    for pos in positions() {
        assert_eq!(a.classify_chunk(pos), b.classify_chunk(pos));
    }

    let other = TerrainGenerator::from_seed(WORLD_SEED ^ 0xFFFF);
    let differs = positions()
        .into_iter()
        .any(|pos| a.classify_chunk(pos) != other.classify_chunk(pos));
    assert!(differs, "different seeds should not classify identically");
}

#[test]
fn worlds_load_the_same_chunks_in_any_order() {
    let dir_a = ScratchDir::new("determinism-a").unwrap();
    let dir_b = ScratchDir::new("determinism-b").unwrap();
    let seed = WorldSeed(WORLD_SEED);
    let mut a = World::create(WorldContext::seeded(WORLD_SEED), seed, dir_a.path()).unwrap();
    let mut b = World::create(WorldContext::seeded(WORLD_SEED), seed, dir_b.path()).unwrap();
    assert_eq!(a.spawn(), b.spawn());

    let far: Vec<ChunkPos> = (0..6).map(|i| ChunkPos::new(30 + i, -25 + i * 3)).collect();
    for pos in &far {
        a.ensure_chunk(*pos);
    }
    for pos in far.iter().rev() {
        b.ensure_chunk(*pos);
    }
    for pos in &far {
        assert_eq!(
            a.ensure_chunk(*pos).tile_ids(),
            b.ensure_chunk(*pos).tile_ids(),
            "chunk {pos}"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Frame {
    player: Vec2,
    health: u8,
    resident: usize,
    agents: Vec<(u64, Vec2, BrainState)>,
}

fn frame(world: &World) -> Frame {
    Frame {
        player: world.player().position,
        health: world.player().health,
        resident: world.resident_chunks(),
        agents: world
            .agents()
            .map(|agent| (agent.id, agent.position, agent.state()))
            .collect(),
    }
}

fn trace(label: &str) -> (ScratchDir, Vec<TickFrame<Frame>>) {
    let dir = ScratchDir::new(label).unwrap();
    let world = World::create(
        WorldContext::seeded(WORLD_SEED),
        WorldSeed(WORLD_SEED),
        dir.path(),
    )
    .unwrap();
    let (_, frames) = run_tick_trace(
        TRACE_TICKS,
        world,
        |tick, world| {
            // Walk a square so the player crosses chunk seams.
            let leg = (tick.0 / 60) % 4;
            let direction = [Vec2::X, Vec2::Y, -Vec2::X, -Vec2::Y][leg as usize];
            world.move_player(direction);
            world.update(tick)?;
            Ok(())
        },
        |_, world| frame(world),
    )
    .unwrap();
    (dir, frames)
}

#[test]
fn tick_traces_are_reproducible() {
    let (dir, first) = trace("trace-a");
    let (_dir_b, second) = trace("trace-b");
    assert_eq!(first.len() as u64, TRACE_TICKS + 1);
    assert_traces_match(&first, &second).unwrap();

    let path = dir.path().join("trace.jsonl");
    write_trace(&path, &first).unwrap();
    let lines = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines as u64, TRACE_TICKS + 1);
}
