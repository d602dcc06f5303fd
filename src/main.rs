//! tilecraft - A deterministic top-down tile sandbox engine
//!
//! Headless simulation runner: opens (or creates) a world, steps it for a
//! number of ticks and saves it.

mod config;
mod headless;

use anyhow::Result;
use clap::Parser;
use config::{GameConfig, DEFAULT_CONFIG_PATH};
use glam::Vec2;
use headless::HeadlessConfig;
use std::path::PathBuf;
use tilecraft_core::WorldSeed;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a tilecraft world headlessly", long_about = None)]
struct Cli {
    /// World seed: an integer, or any text (hashed). Random when omitted.
    #[arg(long)]
    seed: Option<String>,

    /// World directory (overrides the config file)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Ticks to simulate (overrides the config file)
    #[arg(long)]
    ticks: Option<u64>,

    /// Path to the TOML config
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Delete the world directory before starting
    #[arg(long)]
    reset: bool,

    /// Run in a throwaway directory that is removed afterwards
    #[arg(long)]
    no_save: bool,

    /// Walk the player every tick in direction dx,dy
    #[arg(long, value_parser = parse_direction, allow_hyphen_values = true)]
    walk: Option<Vec2>,

    /// Write a JSONL event log to this path
    #[arg(long)]
    events: Option<PathBuf>,
}

fn parse_direction(text: &str) -> Result<Vec2, String> {
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| "expected dx,dy".to_string())?;
    let x: f32 = x.trim().parse().map_err(|e| format!("invalid dx: {e}"))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("invalid dy: {e}"))?;
    Ok(Vec2::new(x, y))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting tilecraft v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let game = GameConfig::load_from_path(&cli.config);
    let seed = cli
        .seed
        .as_deref()
        .map(WorldSeed::parse)
        .unwrap_or_else(WorldSeed::random);

    let summary = headless::run(HeadlessConfig {
        ticks: cli.ticks.unwrap_or(game.ticks),
        game,
        seed,
        save_dir: cli.save_dir,
        no_save: cli.no_save,
        reset_world: cli.reset,
        walk: cli.walk,
        events: cli.events,
    })?;

    println!(
        "tick {} | agents {} | chunks {} | health {}",
        summary.last_tick.0, summary.agents, summary.resident_chunks, summary.player_health
    );
    Ok(())
}
