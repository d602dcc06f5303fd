//! World inspection tool.
//!
//! Usage:
//!   tilecraft-cli map --seed 12345 --chunks -2,-2,2,2
//!   tilecraft-cli biomes --seed hello --chunks -5,-5,5,5 --output biomes.txt
//!   tilecraft-cli region --world saves/world --region 0,0 --compact

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tilecraft_core::WorldSeed;
use tilecraft_world::region::{chunk_from_region, REGION_SLOTS};
use tilecraft_world::{
    chunk_rng, Biome, Chunk, ChunkPos, Region, RegionStore, TerrainGenerator, TileKind,
    TileRegistry, CHUNK_SIZE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect tilecraft worlds and region files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render generated tiles as ASCII
    Map(MapArgs),
    /// Render the biome classification as ASCII
    Biomes(MapArgs),
    /// List the chunks stored in a region file
    Region(RegionArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    /// World seed (integer or any text)
    #[arg(long, default_value = "12345")]
    seed: String,

    /// Chunk bounds, inclusive: min_x,min_y,max_x,max_y
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    chunks: Bounds,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RegionArgs {
    /// World directory
    #[arg(long)]
    world: PathBuf,

    /// Region coordinates: rx,ry
    #[arg(long, value_parser = parse_pair, allow_hyphen_values = true)]
    region: (i32, i32),

    /// Rewrite the file without dead space
    #[arg(long)]
    compact: bool,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

fn parse_ints(text: &str, expected: usize) -> Result<Vec<i32>, String> {
    let parts = text
        .split(',')
        .map(|part| part.trim().parse::<i32>().map_err(|e| format!("invalid number {part:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    if parts.len() != expected {
        return Err(format!("expected {expected} comma-separated numbers"));
    }
    Ok(parts)
}

fn parse_bounds(text: &str) -> Result<Bounds, String> {
    let v = parse_ints(text, 4)?;
    if v[0] > v[2] || v[1] > v[3] {
        return Err("min bounds must not exceed max bounds".to_string());
    }
    Ok(Bounds {
        min_x: v[0],
        min_y: v[1],
        max_x: v[2],
        max_y: v[3],
    })
}

fn parse_pair(text: &str) -> Result<(i32, i32), String> {
    let v = parse_ints(text, 2)?;
    Ok((v[0], v[1]))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match Cli::parse().command {
        Command::Map(args) => {
            let text = render_tiles(&args)?;
            emit(text, args.output)
        }
        Command::Biomes(args) => {
            let text = render_biomes(&args);
            emit(text, args.output)
        }
        Command::Region(args) => inspect_region(&args),
    }
}

fn emit(text: String, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Map saved to: {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn header(title: &str, seed: WorldSeed, bounds: Bounds) -> String {
    format!(
        "{title} (seed: {seed})\nRegion: chunks ({}, {}) to ({}, {})\n",
        bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
    )
}

fn world_span(bounds: Bounds) -> (std::ops::Range<i32>, std::ops::Range<i32>) {
    let size = CHUNK_SIZE as i32;
    (
        bounds.min_x * size..(bounds.max_x + 1) * size,
        bounds.min_y * size..(bounds.max_y + 1) * size,
    )
}

fn render_tiles(args: &MapArgs) -> Result<String> {
    let seed = WorldSeed::parse(&args.seed);
    let generator = TerrainGenerator::from_seed(seed.value());
    let registry = TileRegistry::standard();

    let mut chunks: BTreeMap<ChunkPos, Chunk> = BTreeMap::new();
    for cy in args.chunks.min_y..=args.chunks.max_y {
        for cx in args.chunks.min_x..=args.chunks.max_x {
            let pos = ChunkPos::new(cx, cy);
            let mut rng = chunk_rng(seed, pos);
            chunks.insert(pos, generator.generate_chunk(pos, &registry, &mut rng));
        }
    }
    info!(chunks = chunks.len(), "Generated map chunks");

    let mut out = header("Tile Map", seed, args.chunks);
    out.push_str("\nLegend:\n");
    for kind in TileKind::ALL {
        out.push_str(&format!("  {} = {}\n", kind.glyph(), kind.as_str()));
    }
    out.push('\n');

    let (xs, ys) = world_span(args.chunks);
    for wy in ys {
        for wx in xs.clone() {
            let (lx, ly) = tilecraft_world::local_coords(wx, wy);
            let Some(chunk) = chunks.get(&ChunkPos::containing(wx, wy)) else {
                bail!("chunk for ({wx}, {wy}) was not generated");
            };
            out.push(chunk.tile(lx, ly).kind.glyph());
        }
        out.push('\n');
    }
    Ok(out)
}

fn render_biomes(args: &MapArgs) -> String {
    let seed = WorldSeed::parse(&args.seed);
    let generator = TerrainGenerator::from_seed(seed.value());

    let (xs, ys) = world_span(args.chunks);
    let mut seen: Vec<Biome> = Vec::new();
    let mut grid = String::new();
    for wy in ys {
        for wx in xs.clone() {
            let biome = generator.biome_at(wx, wy);
            if !seen.contains(&biome) {
                seen.push(biome);
            }
            grid.push(biome.glyph());
        }
        grid.push('\n');
    }

    let mut out = header("Biome Map", seed, args.chunks);
    out.push_str("\nLegend:\n");
    for biome in seen {
        out.push_str(&format!("  {} = {}\n", biome.glyph(), biome.as_str()));
    }
    out.push('\n');
    out.push_str(&grid);
    out
}

fn inspect_region(args: &RegionArgs) -> Result<()> {
    let (rx, ry) = args.region;
    if !args.world.is_dir() {
        bail!("{} is not a world directory", args.world.display());
    }
    let store = RegionStore::new(&args.world, 1)
        .with_context(|| format!("Failed to open world at {}", args.world.display()))?;
    let path = store.region_path(rx, ry);
    let Some(mut region) = Region::open_existing(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?
    else {
        bail!("no region file at {}", path.display());
    };

    println!("Region ({rx}, {ry}): {}", path.display());
    println!(
        "  {} of {REGION_SLOTS} slots used, {} bytes on disk",
        region.chunk_count(),
        region.file_len()
    );
    for slot in region.slots() {
        let (cx, cy) = chunk_from_region(rx, ry, slot.local_x, slot.local_y);
        println!(
            "  chunk ({cx:>4}, {cy:>4})  offset {:>8}  length {:>4}",
            slot.offset, slot.length
        );
    }

    if args.compact {
        let reclaimed = region
            .compact()
            .with_context(|| format!("Failed to compact {}", path.display()))?;
        println!("Compacted: reclaimed {reclaimed} bytes");
    }
    Ok(())
}
