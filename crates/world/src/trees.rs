//! Tree decoration rules.
//!
//! Tree species depend on the same climate sample that picked the base tile.
//! Placement is rejected on sand and next to existing trees so forests never
//! clump into solid walls.

use crate::chunk::CHUNK_SIZE;
use crate::noise::Climate;
use crate::terrain::{COLD_LIMIT, LAND_LIMIT, TEMPERATE_LIMIT};
use crate::tile::{Tile, TileKind};
use rand::Rng;

/// Chance that a qualifying cell attempts a tree.
pub const TREE_CHANCE: f64 = 0.125;

/// Chance that a hot, humid tree is a birch rather than an oak.
const BIRCH_CHANCE: f64 = 0.25;

/// Tree species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeType {
    Oak,
    Birch,
    Pine,
}

impl TreeType {
    /// Species suited to a climate sample, if any grows there.
    pub fn for_climate<R: Rng + ?Sized>(climate: &Climate, rng: &mut R) -> Option<Self> {
        let Climate {
            elevation,
            humidity,
            temperature,
        } = *climate;

        if elevation >= LAND_LIMIT {
            return None;
        }
        if temperature < COLD_LIMIT {
            (humidity > 0.05 && elevation > 0.09375).then_some(TreeType::Pine)
        } else if temperature < TEMPERATE_LIMIT {
            (humidity > 0.05 && elevation > 0.0625).then_some(TreeType::Oak)
        } else if humidity > 0.075 && elevation > 0.075 {
            if rng.gen_bool(BIRCH_CHANCE) {
                Some(TreeType::Birch)
            } else {
                Some(TreeType::Oak)
            }
        } else {
            None
        }
    }

    pub fn tile_kind(self) -> TileKind {
        match self {
            TreeType::Oak => TileKind::OakTree,
            TreeType::Birch => TileKind::BirchTree,
            TreeType::Pine => TileKind::PineTree,
        }
    }
}

/// Cells far enough from the chunk edge for a tree's 3x3 footprint.
pub fn in_tree_margin(lx: usize, ly: usize) -> bool {
    (2..CHUNK_SIZE - 2).contains(&lx) && (2..CHUNK_SIZE - 2).contains(&ly)
}

/// A tree may replace `tiles[ly][lx]` when the base is not sand and no tree
/// occupies the surrounding 3x3 block.
pub fn can_place(tiles: &[Tile], lx: usize, ly: usize) -> bool {
    let at = |x: usize, y: usize| tiles[y * CHUNK_SIZE + x].kind;
    if at(lx, ly) == TileKind::Sand {
        return false;
    }
    for y in ly - 1..=ly + 1 {
        for x in lx - 1..=lx + 1 {
            if at(x, y).is_tree() {
                return false;
            }
        }
    }
    true
}
