use crate::config::GameConfig;
use anyhow::{Context, Result};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::{Path, PathBuf};
use tilecraft_core::{SimTick, WorldSeed};
use tilecraft_testkit::{EventRecord, JsonlSink};
use tilecraft_world::{TileRegistry, World, WorldContext};
use tracing::{error, info, warn};

pub struct HeadlessConfig {
    pub game: GameConfig,
    pub seed: WorldSeed,
    pub save_dir: Option<PathBuf>,
    pub no_save: bool,
    pub reset_world: bool,
    pub ticks: u64,
    /// Constant player input applied every tick.
    pub walk: Option<Vec2>,
    pub events: Option<PathBuf>,
}

/// Final state of a headless run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub last_tick: SimTick,
    pub agents: usize,
    pub resident_chunks: usize,
    pub player_health: u8,
}

pub fn run(cfg: HeadlessConfig) -> Result<RunSummary> {
    let requested = cfg.save_dir.clone().unwrap_or_else(|| cfg.game.save_dir.clone());
    let (save_path, cleanup_save_path) =
        prepare_save_dir(Some(&requested), cfg.no_save, cfg.reset_world)?;

    let result = simulate(&cfg, &save_path);

    if cleanup_save_path {
        if let Err(err) = std::fs::remove_dir_all(&save_path) {
            warn!(%err, path = %save_path.display(), "Failed to remove ephemeral save dir");
        }
    }

    result
}

fn simulate(cfg: &HeadlessConfig, save_path: &Path) -> Result<RunSummary> {
    let ctx = WorldContext::new(
        TileRegistry::standard(),
        cfg.game.world.clone(),
        StdRng::seed_from_u64(cfg.seed.value()),
    );
    let mut world = World::open_or_create(ctx, cfg.seed, save_path)
        .with_context(|| format!("failed to open world at {}", save_path.display()))?;
    info!(seed = %world.seed(), spawn = ?world.spawn(), "World ready");

    let mut events = cfg.events.as_ref().map(JsonlSink::create).transpose()?;
    let mut log = |tick: SimTick, kind: &str, payload: &str| -> Result<()> {
        if let Some(sink) = events.as_mut() {
            sink.write(&EventRecord { tick, kind, payload })?;
        }
        Ok(())
    };

    let start = world.time().tick;
    let mut tick = start;
    log(tick, "start", &world.seed().to_string())?;

    for _ in 0..cfg.ticks {
        tick = tick.advance(1);
        if let Some(direction) = cfg.walk {
            world.move_player(direction);
        }
        let health_before = world.player().health;
        world.update(tick)?;
        if world.player().health < health_before {
            log(tick, "player_hurt", &world.player().health.to_string())?;
        }
        if world.player().is_dead() {
            warn!(tick = tick.0, "Player died; stopping the run");
            log(tick, "player_died", "")?;
            break;
        }
        if tick.every(cfg.game.autosave_interval) {
            save(&mut world, tick)?;
            log(tick, "autosave", "")?;
        }
    }

    save(&mut world, tick)?;
    log(tick, "saved", "")?;
    if let Some(sink) = events.as_mut() {
        sink.flush()?;
    }

    let summary = RunSummary {
        last_tick: tick,
        agents: world.agents().count(),
        resident_chunks: world.resident_chunks(),
        player_health: world.player().health,
    };
    info!(
        ticks = tick.0 - start.0,
        agents = summary.agents,
        chunks = summary.resident_chunks,
        health = summary.player_health,
        daylight = world.daylight(),
        "Headless run finished"
    );
    Ok(summary)
}

fn save(world: &mut World, tick: SimTick) -> Result<()> {
    world.save().map_err(|err| {
        error!(%err, tick = tick.0, dir = %world.dir().display(), "Save failed");
        anyhow::Error::new(err).context("failed to save world")
    })
}

fn prepare_save_dir(
    save_dir: Option<&Path>,
    no_save: bool,
    reset_world: bool,
) -> Result<(PathBuf, bool)> {
    let save_dir = if no_save { None } else { save_dir };
    let cleanup = save_dir.is_none();

    let save_path = match save_dir {
        Some(path) => path.to_path_buf(),
        None => {
            let mut rng = rand::thread_rng();
            let suffix = rng.next_u64();
            std::env::temp_dir()
                .join("tilecraft_headless")
                .join(format!("run_{suffix:016x}"))
        }
    };

    if reset_world && save_dir.is_some() {
        if save_path.parent().is_none() {
            anyhow::bail!(
                "refusing to reset save dir with no parent: {}",
                save_path.display()
            );
        }
        if save_path.exists() {
            std::fs::remove_dir_all(&save_path)
                .with_context(|| format!("failed to reset save dir {}", save_path.display()))?;
        }
    }

    std::fs::create_dir_all(&save_path)
        .with_context(|| format!("failed to create save dir {}", save_path.display()))?;

    Ok((save_path, cleanup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecraft_testkit::ScratchDir;

    fn config(dir: &Path, ticks: u64) -> HeadlessConfig {
        HeadlessConfig {
            game: GameConfig::default(),
            seed: WorldSeed(12345),
            save_dir: Some(dir.to_path_buf()),
            no_save: false,
            reset_world: false,
            ticks,
            walk: None,
            events: None,
        }
    }

    #[test]
    fn resumed_runs_continue_the_clock() {
        let scratch = ScratchDir::new("headless-resume").expect("scratch dir");
        let world_dir = scratch.path().join("world");
        let first = run(config(&world_dir, 20)).expect("first run");
        assert_eq!(first.last_tick, SimTick(20));
        assert!(world_dir.join("level.dat").exists());

        let second = run(config(&world_dir, 10)).expect("second run");
        assert_eq!(second.last_tick, SimTick(30));
    }

    #[test]
    fn reset_starts_over() {
        let scratch = ScratchDir::new("headless-reset").expect("scratch dir");
        let world_dir = scratch.path().join("world");
        run(config(&world_dir, 15)).expect("first run");
        let mut cfg = config(&world_dir, 5);
        cfg.reset_world = true;
        assert_eq!(run(cfg).expect("reset run").last_tick, SimTick(5));
    }

    #[test]
    fn event_log_records_start_and_save() {
        let scratch = ScratchDir::new("headless-events").expect("scratch dir");
        let mut cfg = config(&scratch.path().join("world"), 8);
        let log = scratch.path().join("events.jsonl");
        cfg.events = Some(log.clone());
        cfg.walk = Some(Vec2::X);
        run(cfg).expect("run");
        let contents = std::fs::read_to_string(&log).expect("log readable");
        assert!(contents.lines().next().is_some_and(|l| l.contains("\"start\"")));
        assert!(contents.lines().last().is_some_and(|l| l.contains("\"saved\"")));
    }

    #[test]
    fn ephemeral_runs_clean_up() {
        let (path, cleanup) = prepare_save_dir(None, true, false).expect("prepare");
        assert!(cleanup);
        assert!(path.exists());
        std::fs::remove_dir_all(&path).expect("cleanup");
    }
}
