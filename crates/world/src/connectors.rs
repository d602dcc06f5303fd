//! Transition masks between neighbouring tiles.
//!
//! A renderer draws edge overlays wherever a tile borders a kind it "connects
//! with". The mask is derived purely from neighbour kinds and is never stored.

use crate::tile::TileKind;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    /// Sides and corners that need a transition overlay.
    pub struct Connectors: u8 {
        const NORTH = 0b0000_0001;
        const WEST = 0b0000_0010;
        const EAST = 0b0000_0100;
        const SOUTH = 0b0000_1000;
        const NORTH_WEST = 0b0001_0000;
        const NORTH_EAST = 0b0010_0000;
        const SOUTH_WEST = 0b0100_0000;
        const SOUTH_EAST = 0b1000_0000;
    }
}

const SIDES: [(i32, i32, Connectors); 4] = [
    (0, -1, Connectors::NORTH),
    (-1, 0, Connectors::WEST),
    (1, 0, Connectors::EAST),
    (0, 1, Connectors::SOUTH),
];

const CORNERS: [(i32, i32, Connectors, Connectors); 4] = [
    (-1, -1, Connectors::NORTH_WEST, Connectors::NORTH.union(Connectors::WEST)),
    (1, -1, Connectors::NORTH_EAST, Connectors::NORTH.union(Connectors::EAST)),
    (-1, 1, Connectors::SOUTH_WEST, Connectors::SOUTH.union(Connectors::WEST)),
    (1, 1, Connectors::SOUTH_EAST, Connectors::SOUTH.union(Connectors::EAST)),
];

/// Kinds that produce a transition when bordering `kind`. Empty for kinds without overlays.
pub fn connects_with(kind: TileKind) -> &'static [TileKind] {
    use TileKind::*;
    match kind {
        Grass => &[Dirt, Sand, Snow, Water, Hole, Cactus],
        Sand => &[Dirt, Grass, Snow, Water, Hole],
        Snow => &[Dirt, Grass, Sand, Water, Hole, Cactus, Ice],
        Water => &[Dirt, Grass, Sand, Snow, Cactus, Ice],
        Ice => &[Dirt, Snow, Water, Hole, Iceberg],
        Hole => &[Dirt, Grass, Sand, Snow, Cactus, Ice],
        _ => &[],
    }
}

/// Compute the mask for `kind` given a neighbour lookup by offset.
///
/// Unloaded neighbours (`None`) never produce a transition. A corner is only
/// set when both adjoining sides are set.
pub fn compute(kind: TileKind, neighbour: impl Fn(i32, i32) -> Option<TileKind>) -> Connectors {
    let set = connects_with(kind);
    if set.is_empty() {
        return Connectors::empty();
    }
    let matches = |dx, dy| neighbour(dx, dy).is_some_and(|n| set.contains(&n));

    let mut mask = Connectors::empty();
    for (dx, dy, flag) in SIDES {
        if matches(dx, dy) {
            mask |= flag;
        }
    }
    for (dx, dy, flag, sides) in CORNERS {
        if mask.contains(sides) && matches(dx, dy) {
            mask |= flag;
        }
    }
    mask
}
