use std::collections::BTreeMap;

use crate::{Chunk, ChunkPos};

/// In-memory map of active chunks.
/// Uses BTreeMap for deterministic iteration order; exactly one chunk per coordinate.
#[derive(Debug, Default)]
pub struct ChunkStorage {
    chunks: BTreeMap<ChunkPos, Chunk>,
}

impl ChunkStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true when no chunks are currently stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Insert a chunk, replacing any previous chunk at the same coordinate.
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        self.chunks.insert(chunk.position(), chunk)
    }

    /// Attempt to fetch a chunk immutably.
    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Fetch a chunk mutably (without creating it).
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    /// Fetch a chunk, producing it with `make` if it is not resident.
    pub fn get_or_insert_with(&mut self, pos: ChunkPos, make: impl FnOnce() -> Chunk) -> &mut Chunk {
        self.chunks.entry(pos).or_insert_with(make)
    }

    pub fn remove(&mut self, pos: ChunkPos) -> Option<Chunk> {
        self.chunks.remove(&pos)
    }

    /// Iterate over currently resident chunk positions.
    pub fn iter_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Iterate over resident chunks in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Positions whose Chebyshev distance from `center` exceeds `radius`.
    pub fn positions_beyond(&self, center: ChunkPos, radius: i32) -> Vec<ChunkPos> {
        self.iter_positions()
            .filter(|pos| pos.chebyshev_distance(center) > radius)
            .collect()
    }

    /// Positions of chunks with unsaved changes.
    pub fn modified_positions(&self) -> Vec<ChunkPos> {
        self.chunks
            .values()
            .filter(|chunk| chunk.is_modified())
            .map(Chunk::position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_AREA;
    use crate::tile::{Tile, TileKind, TileRegistry};

    fn chunk(x: i32, y: i32, generated: bool) -> Chunk {
        let registry = TileRegistry::standard();
        let tiles = vec![Tile::from_proto(registry.proto(TileKind::Grass), 0); CHUNK_AREA];
        if generated {
            Chunk::generated(ChunkPos::new(x, y), tiles)
        } else {
            Chunk::loaded(ChunkPos::new(x, y), tiles)
        }
    }

    #[test]
    fn one_chunk_per_coordinate() {
        let mut storage = ChunkStorage::new();
        assert!(storage.insert(chunk(0, 0, true)).is_none());
        assert!(storage.insert(chunk(0, 0, false)).is_some());
        assert_eq!(storage.len(), 1);
        assert!(!storage.get(ChunkPos::new(0, 0)).unwrap().is_modified());
    }

    #[test]
    fn iter_positions_is_deterministic() {
        // BTreeMap provides deterministic iteration order
        let mut storage = ChunkStorage::new();
        for (x, y) in [(3, 1), (-2, 0), (0, 5), (-2, -7)] {
            storage.insert(chunk(x, y, false));
        }
        let positions: Vec<_> = storage.iter_positions().collect();
        assert_eq!(
            positions,
            vec![
                ChunkPos::new(-2, -7),
                ChunkPos::new(-2, 0),
                ChunkPos::new(0, 5),
                ChunkPos::new(3, 1),
            ]
        );
    }

    #[test]
    fn positions_beyond_uses_chebyshev_distance() {
        let mut storage = ChunkStorage::new();
        for x in -5..=5 {
            storage.insert(chunk(x, 0, false));
        }
        storage.insert(chunk(1, 6, false));
        let far = storage.positions_beyond(ChunkPos::new(0, 0), 4);
        assert_eq!(
            far,
            vec![
                ChunkPos::new(-5, 0),
                ChunkPos::new(1, 6),
                ChunkPos::new(5, 0),
            ]
        );
    }

    #[test]
    fn modified_positions_tracks_dirty_chunks() {
        let mut storage = ChunkStorage::new();
        storage.insert(chunk(0, 0, true));
        storage.insert(chunk(1, 0, false));
        assert_eq!(storage.modified_positions(), vec![ChunkPos::new(0, 0)]);
        storage.get_mut(ChunkPos::new(0, 0)).unwrap().mark_saved();
        assert!(storage.modified_positions().is_empty());
    }
}
