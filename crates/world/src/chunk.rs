use crate::error::{WorldError, WorldResult};
use crate::tile::{Tile, TileId, TileKind, TileRegistry};
use rand::Rng;
use std::fmt;

/// Chunk side length in tiles.
pub const CHUNK_SIZE: usize = 8;
/// Total tile count per chunk.
pub const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

const CHUNK_SIZE_I32: i32 = CHUNK_SIZE as i32;

/// Chunk coordinate (X,Y) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then y).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk owning a world tile (floor division, so negatives round down).
    pub fn containing(wx: i32, wy: i32) -> Self {
        Self {
            x: wx.div_euclid(CHUNK_SIZE_I32),
            y: wy.div_euclid(CHUNK_SIZE_I32),
        }
    }

    /// World coordinate of local cell (0, 0).
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_SIZE_I32, self.y * CHUNK_SIZE_I32)
    }

    /// World coordinate of a local cell.
    pub fn world_coords(self, lx: usize, ly: usize) -> (i32, i32) {
        let (ox, oy) = self.origin();
        (ox + lx as i32, oy + ly as i32)
    }

    /// Chessboard distance in chunks.
    pub fn chebyshev_distance(self, other: ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Local cell of a world tile within its chunk.
pub fn local_coords(wx: i32, wy: i32) -> (usize, usize) {
    (
        wx.rem_euclid(CHUNK_SIZE_I32) as usize,
        wy.rem_euclid(CHUNK_SIZE_I32) as usize,
    )
}

/// Fixed-size square of tiles plus an unsaved-changes flag.
#[derive(Debug, Clone)]
pub struct Chunk {
    position: ChunkPos,
    tiles: Vec<Tile>,
    modified: bool,
}

impl Chunk {
    /// A freshly generated chunk. It has never been written, so it starts dirty.
    pub fn generated(position: ChunkPos, tiles: Vec<Tile>) -> Self {
        debug_assert_eq!(tiles.len(), CHUNK_AREA);
        Self {
            position,
            tiles,
            modified: true,
        }
    }

    /// A chunk read back from storage; matches disk, so it starts clean.
    pub fn loaded(position: ChunkPos, tiles: Vec<Tile>) -> Self {
        debug_assert_eq!(tiles.len(), CHUNK_AREA);
        Self {
            position,
            tiles,
            modified: false,
        }
    }

    /// Rebuild a loaded chunk from a row-major id grid.
    pub fn from_ids<R: Rng + ?Sized>(
        position: ChunkPos,
        ids: &[TileId],
        registry: &TileRegistry,
        rng: &mut R,
    ) -> WorldResult<Self> {
        if ids.len() != CHUNK_AREA {
            return Err(WorldError::corrupt(format!(
                "chunk {position} has {} tiles, expected {CHUNK_AREA}",
                ids.len()
            )));
        }
        let tiles = ids
            .iter()
            .map(|&id| {
                TileKind::from_id(id)
                    .map(|kind| registry.instantiate(kind, rng))
                    .ok_or_else(|| {
                        WorldError::corrupt(format!("chunk {position} has unknown tile id {id}"))
                    })
            })
            .collect::<WorldResult<Vec<_>>>()?;
        Ok(Self::loaded(position, tiles))
    }

    #[inline]
    fn index(lx: usize, ly: usize) -> usize {
        debug_assert!(lx < CHUNK_SIZE);
        debug_assert!(ly < CHUNK_SIZE);
        ly * CHUNK_SIZE + lx
    }

    pub fn position(&self) -> ChunkPos {
        self.position
    }

    #[inline]
    pub fn tile(&self, lx: usize, ly: usize) -> &Tile {
        &self.tiles[Self::index(lx, ly)]
    }

    /// Mutable access for in-place health changes. Does not mark the chunk dirty;
    /// health is not persisted.
    #[inline]
    pub fn tile_mut(&mut self, lx: usize, ly: usize) -> &mut Tile {
        &mut self.tiles[Self::index(lx, ly)]
    }

    /// Replace a cell and mark the chunk dirty.
    pub fn set_tile(&mut self, lx: usize, ly: usize, tile: Tile) {
        self.tiles[Self::index(lx, ly)] = tile;
        self.modified = true;
    }

    /// Row-major tiles (`y * CHUNK_SIZE + x`).
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterate `(lx, ly, tile)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, tile)| (i % CHUNK_SIZE, i / CHUNK_SIZE, tile))
    }

    /// Fixed-width id grid used for persistence.
    pub fn tile_ids(&self) -> [TileId; CHUNK_AREA] {
        let mut ids = [0; CHUNK_AREA];
        for (slot, tile) in ids.iter_mut().zip(&self.tiles) {
            *slot = tile.id();
        }
        ids
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the dirty flag once the chunk has been durably written.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn filled(kind: TileKind) -> Vec<Tile> {
        let registry = TileRegistry::standard();
        vec![Tile::from_proto(registry.proto(kind), 0); CHUNK_AREA]
    }

    #[test]
    fn containing_floors_negative_coordinates() {
        assert_eq!(ChunkPos::containing(0, 0), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(7, 7), ChunkPos::new(0, 0));
        assert_eq!(ChunkPos::containing(8, -1), ChunkPos::new(1, -1));
        assert_eq!(ChunkPos::containing(-8, -9), ChunkPos::new(-1, -2));
        assert_eq!(local_coords(-1, -9), (7, 7));
        assert_eq!(local_coords(9, 16), (1, 0));
    }

    #[test]
    fn world_coords_invert_containing() {
        for wx in -20..20 {
            for wy in [-17, -8, -1, 0, 5, 31] {
                let pos = ChunkPos::containing(wx, wy);
                let (lx, ly) = local_coords(wx, wy);
                assert_eq!(pos.world_coords(lx, ly), (wx, wy));
            }
        }
    }

    #[test]
    fn generated_chunks_start_dirty_and_loaded_start_clean() {
        let pos = ChunkPos::new(2, -3);
        assert!(Chunk::generated(pos, filled(TileKind::Grass)).is_modified());
        let mut loaded = Chunk::loaded(pos, filled(TileKind::Grass));
        assert!(!loaded.is_modified());

        let registry = TileRegistry::standard();
        loaded.set_tile(1, 1, Tile::from_proto(registry.proto(TileKind::Dirt), 0));
        assert!(loaded.is_modified());
        loaded.mark_saved();
        assert!(!loaded.is_modified());
    }

    #[test]
    fn ids_rebuild_the_same_grid() {
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(5);
        let ids: Vec<TileId> = (0..CHUNK_AREA)
            .map(|i| (i % TileKind::COUNT) as TileId)
            .collect();
        let chunk = Chunk::from_ids(ChunkPos::new(0, 0), &ids, &registry, &mut rng).unwrap();
        assert_eq!(chunk.tile_ids().to_vec(), ids);
        assert!(!chunk.is_modified());
    }

    #[test]
    fn unknown_ids_are_corruption() {
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(5);
        let ids = [250u8; CHUNK_AREA];
        let err = Chunk::from_ids(ChunkPos::new(0, 0), &ids, &registry, &mut rng).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn chebyshev_distance_uses_larger_axis() {
        let a = ChunkPos::new(0, 0);
        assert_eq!(a.chebyshev_distance(ChunkPos::new(3, -1)), 3);
        assert_eq!(a.chebyshev_distance(ChunkPos::new(-2, 5)), 5);
    }
}
