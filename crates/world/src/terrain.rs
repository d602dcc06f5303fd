//! Terrain generation from the three noise channels.
//!
//! Generation runs in two passes. The base pass classifies every cell into a
//! [`Biome`] from its climate sample and stamps the biome's surface tile. The
//! decoration pass then attempts trees on qualifying land cells. Classification
//! is a pure function of the permutation table; the surface variation and tree
//! rolls draw from a caller-supplied RNG.

use crate::chunk::{Chunk, ChunkPos, CHUNK_AREA, CHUNK_SIZE};
use crate::noise::{Climate, Permutation};
use crate::tile::{TileKind, TileRegistry};
use crate::trees::{can_place, in_tree_margin, TreeType, TREE_CHANCE};
use rand::Rng;
use std::fmt;
use tracing::{debug, instrument};

/// Below this elevation the sea is deep.
pub const DEEP_WATER_LIMIT: f64 = 0.035;
/// Cold cells up to this elevation freeze into icebergs.
pub const ICEBERG_LIMIT: f64 = 0.04;
/// Shallow water (or sheet ice) up to this elevation.
pub const SHALLOWS_LIMIT: f64 = 0.0525;
/// Beach band upper bound.
pub const BEACH_LIMIT: f64 = 0.075;
/// Main land band upper bound; trees only grow below it.
pub const LAND_LIMIT: f64 = 0.21875;
/// Bare stone band upper bound; above it lies highland dirt.
pub const MOUNTAIN_LIMIT: f64 = 0.24375;

/// Temperatures below this are cold.
pub const COLD_LIMIT: f64 = 0.46875;
/// Temperatures below this (and not cold) are temperate; above are hot.
pub const TEMPERATE_LIMIT: f64 = 0.525;
/// Hot land drier than this is desert.
pub const DESERT_HUMIDITY: f64 = 0.0375;

const CACTUS_CHANCE: f64 = 0.025;
const FLOWER_CHANCE: f64 = 0.09;

/// Noise-driven classification of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Biome {
    DeepWater,
    FrozenSea,
    IceSheet,
    Shallows,
    SnowyBeach,
    Beach,
    Tundra,
    Meadow,
    Desert,
    Savanna,
    Mountain,
    Highland,
}

impl Biome {
    /// Decision table over the elevation bands, then temperature and humidity.
    pub fn classify(climate: &Climate) -> Self {
        let Climate {
            elevation,
            humidity,
            temperature,
        } = *climate;
        let cold = temperature < COLD_LIMIT;

        if elevation < DEEP_WATER_LIMIT {
            Biome::DeepWater
        } else if elevation < ICEBERG_LIMIT {
            if cold {
                Biome::FrozenSea
            } else {
                Biome::DeepWater
            }
        } else if elevation < SHALLOWS_LIMIT {
            if cold {
                Biome::IceSheet
            } else {
                Biome::Shallows
            }
        } else if elevation < BEACH_LIMIT {
            if cold {
                Biome::SnowyBeach
            } else {
                Biome::Beach
            }
        } else if elevation < LAND_LIMIT {
            if cold {
                Biome::Tundra
            } else if temperature < TEMPERATE_LIMIT {
                Biome::Meadow
            } else if humidity < DESERT_HUMIDITY {
                Biome::Desert
            } else {
                Biome::Savanna
            }
        } else if elevation < MOUNTAIN_LIMIT {
            Biome::Mountain
        } else {
            Biome::Highland
        }
    }

    /// Dominant tile, ignoring random variation.
    pub const fn base_tile(self) -> TileKind {
        match self {
            Biome::DeepWater | Biome::Shallows => TileKind::Water,
            Biome::FrozenSea => TileKind::Iceberg,
            Biome::IceSheet => TileKind::Ice,
            Biome::SnowyBeach | Biome::Tundra => TileKind::Snow,
            Biome::Beach | Biome::Desert => TileKind::Sand,
            Biome::Meadow | Biome::Savanna => TileKind::Grass,
            Biome::Mountain => TileKind::Stone,
            Biome::Highland => TileKind::Dirt,
        }
    }

    /// Surface tile with the biome's small random variation applied.
    pub fn surface<R: Rng + ?Sized>(self, rng: &mut R) -> TileKind {
        match self {
            Biome::Beach if rng.gen_bool(CACTUS_CHANCE) => TileKind::Cactus,
            Biome::Meadow if rng.gen_bool(FLOWER_CHANCE) => TileKind::Flower,
            other => other.base_tile(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Biome::DeepWater => "deep_water",
            Biome::FrozenSea => "frozen_sea",
            Biome::IceSheet => "ice_sheet",
            Biome::Shallows => "shallows",
            Biome::SnowyBeach => "snowy_beach",
            Biome::Beach => "beach",
            Biome::Tundra => "tundra",
            Biome::Meadow => "meadow",
            Biome::Desert => "desert",
            Biome::Savanna => "savanna",
            Biome::Mountain => "mountain",
            Biome::Highland => "highland",
        }
    }

    /// Single-character glyph for ASCII biome maps.
    pub const fn glyph(self) -> char {
        match self {
            Biome::DeepWater => '~',
            Biome::FrozenSea => 'A',
            Biome::IceSheet => '=',
            Biome::Shallows => '-',
            Biome::SnowyBeach => '_',
            Biome::Beach => '.',
            Biome::Tundra => 't',
            Biome::Meadow => ',',
            Biome::Desert => 'd',
            Biome::Savanna => 's',
            Biome::Mountain => '#',
            Biome::Highland => 'h',
        }
    }
}

impl fmt::Display for Biome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terrain generator bound to one world's permutation table.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    perm: Permutation,
}

impl TerrainGenerator {
    pub fn new(perm: Permutation) -> Self {
        Self { perm }
    }

    /// Build the permutation from a world seed.
    pub fn from_seed(world_seed: u64) -> Self {
        Self::new(Permutation::from_seed(world_seed))
    }

    pub fn permutation(&self) -> &Permutation {
        &self.perm
    }

    pub fn climate(&self, wx: i32, wy: i32) -> Climate {
        self.perm.climate(wx, wy)
    }

    pub fn biome_at(&self, wx: i32, wy: i32) -> Biome {
        Biome::classify(&self.climate(wx, wy))
    }

    /// Deterministic classification of every cell in a chunk, row-major.
    pub fn classify_chunk(&self, pos: ChunkPos) -> Vec<Biome> {
        let mut biomes = Vec::with_capacity(CHUNK_AREA);
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let (wx, wy) = pos.world_coords(lx, ly);
                biomes.push(self.biome_at(wx, wy));
            }
        }
        biomes
    }

    /// Generate the tiles of a chunk.
    ///
    /// The returned chunk is marked modified; it has never been written.
    #[instrument(skip(self, registry, rng), fields(chunk_pos = %pos))]
    pub fn generate_chunk<R: Rng + ?Sized>(
        &self,
        pos: ChunkPos,
        registry: &TileRegistry,
        rng: &mut R,
    ) -> Chunk {
        let mut climates = Vec::with_capacity(CHUNK_AREA);
        let mut tiles = Vec::with_capacity(CHUNK_AREA);

        // Base pass.
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let (wx, wy) = pos.world_coords(lx, ly);
                let climate = self.climate(wx, wy);
                let kind = Biome::classify(&climate).surface(rng);
                tiles.push(registry.instantiate(kind, rng));
                climates.push(climate);
            }
        }

        // Decoration pass.
        let mut trees = 0usize;
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let index = ly * CHUNK_SIZE + lx;
                if !tiles[index].is_walkable() || !in_tree_margin(lx, ly) {
                    continue;
                }
                if !rng.gen_bool(TREE_CHANCE) {
                    continue;
                }
                let Some(tree) = TreeType::for_climate(&climates[index], rng) else {
                    continue;
                };
                if can_place(&tiles, lx, ly) {
                    tiles[index] = registry.instantiate(tree.tile_kind(), rng);
                    trees += 1;
                }
            }
        }

        debug!(trees, "Terrain generation complete");
        Chunk::generated(pos, tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn climate(elevation: f64, humidity: f64, temperature: f64) -> Climate {
        Climate {
            elevation,
            humidity,
            temperature,
        }
    }

    #[test]
    fn elevation_bands() {
        assert_eq!(Biome::classify(&climate(-0.2, 0.0, 0.5)), Biome::DeepWater);
        assert_eq!(Biome::classify(&climate(0.038, 0.0, 0.5)), Biome::DeepWater);
        assert_eq!(Biome::classify(&climate(0.038, 0.0, 0.2)), Biome::FrozenSea);
        assert_eq!(Biome::classify(&climate(0.05, 0.0, 0.5)), Biome::Shallows);
        assert_eq!(Biome::classify(&climate(0.05, 0.0, 0.2)), Biome::IceSheet);
        assert_eq!(Biome::classify(&climate(0.06, 0.0, 0.5)), Biome::Beach);
        assert_eq!(Biome::classify(&climate(0.06, 0.0, 0.2)), Biome::SnowyBeach);
        assert_eq!(Biome::classify(&climate(0.23, 0.0, 0.5)), Biome::Mountain);
        assert_eq!(Biome::classify(&climate(0.5, 0.0, 0.5)), Biome::Highland);
    }

    #[test]
    fn land_quadrants() {
        assert_eq!(Biome::classify(&climate(0.1, 0.0, 0.3)), Biome::Tundra);
        assert_eq!(Biome::classify(&climate(0.1, 0.0, 0.5)), Biome::Meadow);
        assert_eq!(Biome::classify(&climate(0.1, 0.01, 0.8)), Biome::Desert);
        assert_eq!(Biome::classify(&climate(0.1, 0.2, 0.8)), Biome::Savanna);
    }

    #[test]
    fn surface_variation_stays_within_biome() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            assert!(matches!(
                Biome::Beach.surface(&mut rng),
                TileKind::Sand | TileKind::Cactus
            ));
            assert!(matches!(
                Biome::Meadow.surface(&mut rng),
                TileKind::Grass | TileKind::Flower
            ));
            assert_eq!(Biome::Desert.surface(&mut rng), TileKind::Sand);
        }
    }

    #[test]
    fn classification_is_seed_deterministic() {
        let a = TerrainGenerator::from_seed(12345);
        let b = TerrainGenerator::from_seed(12345);
        for (cx, cy) in [(0, 0), (-3, 7), (40, -12)] {
            let pos = ChunkPos::new(cx, cy);
            assert_eq!(a.classify_chunk(pos), b.classify_chunk(pos));
        }
    }

    #[test]
    fn generated_tiles_match_their_biome() {
        let generator = TerrainGenerator::from_seed(777);
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(1);
        for (cx, cy) in [(0, 0), (5, 5), (-9, 2), (100, 100)] {
            let pos = ChunkPos::new(cx, cy);
            let chunk = generator.generate_chunk(pos, &registry, &mut rng);
            assert!(chunk.is_modified());
            let biomes = generator.classify_chunk(pos);
            for ((lx, ly, tile), biome) in chunk.iter().zip(&biomes) {
                let base = biome.base_tile();
                let ok = tile.kind == base
                    || tile.kind.is_tree()
                    || matches!(
                        (biome, tile.kind),
                        (Biome::Beach, TileKind::Cactus) | (Biome::Meadow, TileKind::Flower)
                    );
                assert!(ok, "{pos} ({lx}, {ly}): {} in {biome}", tile.kind);
            }
        }
    }

    #[test]
    fn trees_never_touch_each_other() {
        let generator = TerrainGenerator::from_seed(4242);
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(2);
        for cx in -10..10 {
            for cy in -10..10 {
                let chunk = generator.generate_chunk(ChunkPos::new(cx, cy), &registry, &mut rng);
                for (lx, ly, tile) in chunk.iter() {
                    if !tile.kind.is_tree() {
                        continue;
                    }
                    assert!(in_tree_margin(lx, ly));
                    for (nx, ny, other) in chunk.iter() {
                        let near = nx.abs_diff(lx) <= 1 && ny.abs_diff(ly) <= 1;
                        if near && (nx, ny) != (lx, ly) {
                            assert!(!other.kind.is_tree());
                        }
                    }
                }
            }
        }
    }
}
