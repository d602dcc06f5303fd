//! Region files: random-access storage for 16x16 chunks per file.
//!
//! Layout of `r.<rx>.<ry>.rgn`:
//!
//! ```text
//! [0, 2048)      256 slot entries, 8 bytes each: u32 BE offset, u32 BE length
//! [2048, EOF)    chunk payloads
//! ```
//!
//! Slot index is `ly * 16 + lx`. An entry of `(0, 0)` means the chunk is absent.
//! Payloads are fixed width (one byte per tile id followed by a big-endian
//! CRC32), so rewriting a chunk always fits its previous byte range and is done
//! in place. A payload of a different length is appended at end of file and the
//! old bytes become garbage that [`Region::compact`] can reclaim.

use crate::chunk::{Chunk, ChunkPos, CHUNK_AREA};
use crate::error::{IoContext, WorldError, WorldResult};
use crate::tile::{TileId, TileRegistry};
use crc32fast::Hasher;
use lru::LruCache;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Region side length in chunks.
pub const REGION_SIZE: i32 = 16;
/// Chunk slots per region.
pub const REGION_SLOTS: usize = (REGION_SIZE * REGION_SIZE) as usize;
const ENTRY_SIZE: usize = 8;
/// Size of the slot directory at the start of every region file.
pub const HEADER_SIZE: u64 = (REGION_SLOTS * ENTRY_SIZE) as u64;
/// Encoded chunk size: tile ids plus a CRC32 trailer.
pub const CHUNK_PAYLOAD_LEN: usize = CHUNK_AREA + 4;

const REGION_SHIFT: i32 = 4;
const REGION_MASK: i32 = REGION_SIZE - 1;

/// Split chunk coordinates into `(region_x, region_y, local_x, local_y)`.
///
/// Arithmetic shift and mask, so negative chunks land in negative regions with
/// non-negative local coordinates.
pub fn get_region(cx: i32, cy: i32) -> (i32, i32, usize, usize) {
    (
        cx >> REGION_SHIFT,
        cy >> REGION_SHIFT,
        (cx & REGION_MASK) as usize,
        (cy & REGION_MASK) as usize,
    )
}

/// Inverse of [`get_region`].
pub fn chunk_from_region(rx: i32, ry: i32, lx: usize, ly: usize) -> (i32, i32) {
    (
        (rx << REGION_SHIFT) | lx as i32,
        (ry << REGION_SHIFT) | ly as i32,
    )
}

/// Serialize a tile-id grid into the fixed-width payload.
pub fn encode_chunk(ids: &[TileId; CHUNK_AREA]) -> Vec<u8> {
    let mut hasher = Hasher::new();
    hasher.update(ids);
    let crc = hasher.finalize();

    let mut bytes = Vec::with_capacity(CHUNK_PAYLOAD_LEN);
    bytes.extend_from_slice(ids);
    bytes.extend_from_slice(&crc.to_be_bytes());
    bytes
}

/// Validate and unpack a payload produced by [`encode_chunk`].
pub fn decode_chunk(bytes: &[u8]) -> WorldResult<[TileId; CHUNK_AREA]> {
    if bytes.len() != CHUNK_PAYLOAD_LEN {
        return Err(WorldError::corrupt(format!(
            "chunk payload is {} bytes, expected {CHUNK_PAYLOAD_LEN}",
            bytes.len()
        )));
    }
    let (body, trailer) = bytes.split_at(CHUNK_AREA);
    let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

    let mut hasher = Hasher::new();
    hasher.update(body);
    let computed = hasher.finalize();
    if computed != stored {
        return Err(WorldError::corrupt(format!(
            "chunk CRC32 mismatch: expected {stored:08X}, got {computed:08X}"
        )));
    }

    let mut ids = [0; CHUNK_AREA];
    ids.copy_from_slice(body);
    Ok(ids)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SlotEntry {
    offset: u32,
    length: u32,
}

impl SlotEntry {
    const ABSENT: Self = Self {
        offset: 0,
        length: 0,
    };

    fn is_present(self) -> bool {
        self.offset != 0
    }

    fn end(self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    /// Points at a byte range inside the data area of a file of `file_len` bytes.
    fn is_valid(self, file_len: u64) -> bool {
        self.offset as u64 >= HEADER_SIZE && self.end() <= file_len
    }
}

fn slot_index(lx: usize, ly: usize) -> WorldResult<usize> {
    let side = REGION_SIZE as usize;
    if lx >= side || ly >= side {
        return Err(WorldError::InvalidCoordinate {
            x: lx as f32,
            y: ly as f32,
        });
    }
    Ok(ly * side + lx)
}

/// Occupied slot as reported by [`Region::slots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub local_x: usize,
    pub local_y: usize,
    pub offset: u32,
    pub length: u32,
}

/// One open region file with its slot directory cached in memory.
#[derive(Debug)]
pub struct Region {
    path: PathBuf,
    file: File,
    header: Vec<SlotEntry>,
    file_len: u64,
}

impl Region {
    /// Open a region file, creating it with an empty directory if needed.
    pub fn open(path: &Path) -> WorldResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create region directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .io_context(|| format!("Failed to open region file {}", path.display()))?;
        Self::load(path, file)
    }

    /// Open an existing region file. A missing file is `Ok(None)`, not an error.
    pub fn open_existing(path: &Path) -> WorldResult<Option<Self>> {
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Self::load(path, file).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(WorldError::io(
                format!("Failed to open region file {}", path.display()),
                err,
            )),
        }
    }

    fn load(path: &Path, mut file: File) -> WorldResult<Self> {
        let mut file_len = file
            .metadata()
            .io_context(|| format!("Failed to stat region file {}", path.display()))?
            .len();

        if file_len < HEADER_SIZE {
            if file_len > 0 {
                warn!(
                    path = %path.display(),
                    file_len,
                    "Region header truncated; reinitialising slot directory"
                );
            }
            file.set_len(HEADER_SIZE)
                .io_context(|| format!("Failed to size region file {}", path.display()))?;
            file_len = HEADER_SIZE;
        }

        let mut raw = vec![0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_exact(&mut raw))
            .io_context(|| format!("Failed to read region header {}", path.display()))?;

        let header = raw
            .chunks_exact(ENTRY_SIZE)
            .map(|entry| SlotEntry {
                offset: u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]),
                length: u32::from_be_bytes([entry[4], entry[5], entry[6], entry[7]]),
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            file_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes, including garbage.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn contains(&self, lx: usize, ly: usize) -> bool {
        slot_index(lx, ly).is_ok_and(|slot| self.header[slot].is_present())
    }

    pub fn chunk_count(&self) -> usize {
        self.header.iter().filter(|e| e.is_present()).count()
    }

    /// Occupied slots in slot order.
    pub fn slots(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.header
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_present())
            .map(|(i, e)| SlotInfo {
                local_x: i % REGION_SIZE as usize,
                local_y: i / REGION_SIZE as usize,
                offset: e.offset,
                length: e.length,
            })
    }

    /// Read the raw payload of a slot.
    pub fn read_chunk(&mut self, lx: usize, ly: usize) -> WorldResult<Option<Vec<u8>>> {
        let entry = self.header[slot_index(lx, ly)?];
        if !entry.is_present() {
            return Ok(None);
        }
        if !entry.is_valid(self.file_len) {
            return Err(WorldError::corrupt(format!(
                "slot ({lx}, {ly}) of {} points at {}..{} outside the data area (file is {} bytes)",
                self.path.display(),
                entry.offset,
                entry.end(),
                self.file_len
            )));
        }

        let mut bytes = vec![0u8; entry.length as usize];
        self.file
            .seek(SeekFrom::Start(entry.offset as u64))
            .io_context(|| format!("Failed to seek in {}", self.path.display()))?;
        match self.file.read_exact(&mut bytes) {
            Ok(()) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(WorldError::corrupt(
                format!("slot ({lx}, {ly}) of {} is truncated", self.path.display()),
            )),
            Err(err) => Err(WorldError::io(
                format!("Failed to read chunk from {}", self.path.display()),
                err,
            )),
        }
    }

    /// Write a payload into a slot.
    ///
    /// Overwrites in place when the slot already holds a payload of the same
    /// length; otherwise appends at end of file (never inside the header).
    pub fn write_chunk(&mut self, lx: usize, ly: usize, bytes: &[u8]) -> WorldResult<()> {
        let slot = slot_index(lx, ly)?;
        let length = u32::try_from(bytes.len()).map_err(|_| {
            WorldError::corrupt(format!("chunk payload of {} bytes is too large", bytes.len()))
        })?;
        let previous = self.header[slot];

        let offset = if previous.is_present()
            && previous.length == length
            && previous.is_valid(self.file_len)
        {
            previous.offset as u64
        } else {
            self.file_len.max(HEADER_SIZE)
        };
        let offset_u32 = u32::try_from(offset).map_err(|_| {
            WorldError::corrupt(format!("region {} exceeds 4 GiB", self.path.display()))
        })?;

        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(bytes))
            .io_context(|| format!("Failed to write chunk to {}", self.path.display()))?;
        self.file_len = self.file_len.max(offset + bytes.len() as u64);

        self.set_entry(
            slot,
            SlotEntry {
                offset: offset_u32,
                length,
            },
        )
    }

    /// Unlink a slot. The payload bytes stay in the file until compaction.
    pub fn remove_chunk(&mut self, lx: usize, ly: usize) -> WorldResult<bool> {
        let slot = slot_index(lx, ly)?;
        if !self.header[slot].is_present() {
            return Ok(false);
        }
        self.set_entry(slot, SlotEntry::ABSENT)?;
        Ok(true)
    }

    fn set_entry(&mut self, slot: usize, entry: SlotEntry) -> WorldResult<()> {
        let mut raw = [0u8; ENTRY_SIZE];
        raw[..4].copy_from_slice(&entry.offset.to_be_bytes());
        raw[4..].copy_from_slice(&entry.length.to_be_bytes());
        self.file
            .seek(SeekFrom::Start((slot * ENTRY_SIZE) as u64))
            .and_then(|_| self.file.write_all(&raw))
            .io_context(|| format!("Failed to update header of {}", self.path.display()))?;
        self.header[slot] = entry;
        Ok(())
    }

    /// Rewrite live payloads contiguously after the header and truncate garbage.
    ///
    /// Slots whose entries are unreadable are dropped. Returns the number of
    /// bytes reclaimed.
    pub fn compact(&mut self) -> WorldResult<u64> {
        let mut live = Vec::new();
        for slot in 0..REGION_SLOTS {
            let entry = self.header[slot];
            if !entry.is_present() {
                continue;
            }
            let (lx, ly) = (slot % REGION_SIZE as usize, slot / REGION_SIZE as usize);
            match self.read_chunk(lx, ly) {
                Ok(Some(bytes)) => live.push((slot, bytes)),
                Ok(None) => {}
                Err(err) if err.is_corruption() => {
                    warn!(path = %self.path.display(), lx, ly, %err, "Dropping unreadable slot during compaction");
                }
                Err(err) => return Err(err),
            }
        }

        let mut header = vec![SlotEntry::ABSENT; REGION_SLOTS];
        let mut data = Vec::new();
        for (slot, bytes) in &live {
            header[*slot] = SlotEntry {
                offset: (HEADER_SIZE as usize + data.len()) as u32,
                length: bytes.len() as u32,
            };
            data.extend_from_slice(bytes);
        }

        let mut raw = Vec::with_capacity(HEADER_SIZE as usize + data.len());
        for entry in &header {
            raw.extend_from_slice(&entry.offset.to_be_bytes());
            raw.extend_from_slice(&entry.length.to_be_bytes());
        }
        raw.extend_from_slice(&data);

        let new_len = raw.len() as u64;
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&raw))
            .and_then(|_| self.file.set_len(new_len))
            .and_then(|_| self.file.sync_data())
            .io_context(|| format!("Failed to compact {}", self.path.display()))?;

        let reclaimed = self.file_len.saturating_sub(new_len);
        self.header = header;
        self.file_len = new_len;
        info!(path = %self.path.display(), chunks = live.len(), reclaimed, "Compacted region");
        Ok(reclaimed)
    }

    /// Flush written data to disk.
    pub fn sync(&mut self) -> WorldResult<()> {
        self.file
            .sync_data()
            .io_context(|| format!("Failed to sync {}", self.path.display()))
    }
}

/// Region handle cache rooted at `<world>/region`.
///
/// Handles are kept open in an LRU; an evicted handle is synced before it is
/// closed. All writes go straight to the file, so a later read of the same
/// chunk always observes them.
pub struct RegionStore {
    root: PathBuf,
    handles: LruCache<(i32, i32), Region>,
}

impl RegionStore {
    /// Create a store under `world_dir`, creating the region directory.
    pub fn new<P: AsRef<Path>>(world_dir: P, cache_capacity: usize) -> WorldResult<Self> {
        let root = world_dir.as_ref().join("region");
        fs::create_dir_all(&root)
            .io_context(|| format!("Failed to create region directory {}", root.display()))?;
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root,
            handles: LruCache::new(capacity),
        })
    }

    /// Directory holding the region files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the region file for region coordinates.
    pub fn region_path(&self, rx: i32, ry: i32) -> PathBuf {
        self.root.join(format!("r.{rx}.{ry}.rgn"))
    }

    /// Number of open handles.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn region(&mut self, rx: i32, ry: i32, create: bool) -> WorldResult<Option<&mut Region>> {
        let key = (rx, ry);
        if !self.handles.contains(&key) {
            let path = self.region_path(rx, ry);
            let region = if create {
                Region::open(&path)?
            } else {
                match Region::open_existing(&path)? {
                    Some(region) => region,
                    None => return Ok(None),
                }
            };
            if let Some((evicted_key, mut evicted)) = self.handles.push(key, region) {
                if evicted_key != key {
                    debug!(region = ?evicted_key, "Closing region handle");
                    if let Err(err) = evicted.sync() {
                        warn!(%err, "Failed to sync evicted region handle");
                    }
                }
            }
        }
        Ok(self.handles.get_mut(&key))
    }

    /// Persist a chunk's tile ids.
    pub fn save_chunk(&mut self, chunk: &Chunk) -> WorldResult<()> {
        let pos = chunk.position();
        let (rx, ry, lx, ly) = get_region(pos.x, pos.y);
        let payload = encode_chunk(&chunk.tile_ids());
        match self.region(rx, ry, true)? {
            Some(region) => region.write_chunk(lx, ly, &payload),
            None => Err(WorldError::io(
                format!("Region ({rx}, {ry}) unavailable"),
                ErrorKind::NotFound.into(),
            )),
        }
    }

    /// Read and validate a chunk's tile ids. Absent chunks and missing files are `Ok(None)`.
    pub fn read_chunk_ids(&mut self, pos: ChunkPos) -> WorldResult<Option<[TileId; CHUNK_AREA]>> {
        let (rx, ry, lx, ly) = get_region(pos.x, pos.y);
        let Some(region) = self.region(rx, ry, false)? else {
            return Ok(None);
        };
        match region.read_chunk(lx, ly)? {
            Some(bytes) => decode_chunk(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Load a chunk for the world manager.
    ///
    /// Any failure is logged and reported as absent so the caller regenerates.
    pub fn load_chunk<R: Rng + ?Sized>(
        &mut self,
        pos: ChunkPos,
        registry: &TileRegistry,
        rng: &mut R,
    ) -> Option<Chunk> {
        let result = self
            .read_chunk_ids(pos)
            .and_then(|ids| {
                ids.map(|ids| Chunk::from_ids(pos, &ids, registry, rng))
                    .transpose()
            });
        match result {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(chunk = %pos, %err, "Discarding unreadable chunk; it will be regenerated");
                None
            }
        }
    }

    /// Unlink a stored chunk.
    pub fn remove_chunk(&mut self, pos: ChunkPos) -> WorldResult<bool> {
        let (rx, ry, lx, ly) = get_region(pos.x, pos.y);
        match self.region(rx, ry, false)? {
            Some(region) => region.remove_chunk(lx, ly),
            None => Ok(false),
        }
    }

    /// True when the chunk has a stored payload.
    pub fn contains(&mut self, pos: ChunkPos) -> WorldResult<bool> {
        let (rx, ry, lx, ly) = get_region(pos.x, pos.y);
        Ok(self
            .region(rx, ry, false)?
            .is_some_and(|region| region.contains(lx, ly)))
    }

    /// Compact one region file, if it exists.
    pub fn compact_region(&mut self, rx: i32, ry: i32) -> WorldResult<Option<u64>> {
        match self.region(rx, ry, false)? {
            Some(region) => region.compact().map(Some),
            None => Ok(None),
        }
    }

    /// Sync every open handle.
    pub fn flush(&mut self) -> WorldResult<()> {
        for (_, region) in self.handles.iter_mut() {
            region.sync()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CHUNK_SIZE;
    use crate::tile::{Tile, TileKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tilecraft_testkit::ScratchDir;

    fn ids_with(fill: TileId) -> [TileId; CHUNK_AREA] {
        [fill; CHUNK_AREA]
    }

    #[test]
    fn get_region_examples() {
        assert_eq!(get_region(0, 0), (0, 0, 0, 0));
        assert_eq!(get_region(15, 17), (0, 1, 15, 1));
        assert_eq!(get_region(-1, -16), (-1, -1, 15, 0));
        assert_eq!(get_region(-17, 33), (-2, 2, 15, 1));
        assert_eq!(chunk_from_region(-2, 2, 15, 1), (-17, 33));
    }

    #[test]
    fn payload_detects_bit_flips() {
        let mut bytes = encode_chunk(&ids_with(4));
        assert_eq!(bytes.len(), CHUNK_PAYLOAD_LEN);
        assert_eq!(decode_chunk(&bytes).unwrap(), ids_with(4));
        bytes[10] ^= 0x01;
        assert!(decode_chunk(&bytes).unwrap_err().is_corruption());
        assert!(decode_chunk(&bytes[..20]).unwrap_err().is_corruption());
    }

    #[test]
    fn new_region_has_empty_directory() {
        let dir = ScratchDir::new("region_new").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        let mut region = Region::open(&path).unwrap();
        assert_eq!(region.file_len(), HEADER_SIZE);
        assert_eq!(region.chunk_count(), 0);
        assert_eq!(region.read_chunk(3, 4).unwrap(), None);
    }

    #[test]
    fn out_of_range_slots_are_rejected() {
        let dir = ScratchDir::new("region_bounds").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        let mut region = Region::open(&path).unwrap();
        region.write_chunk(0, 1, b"below").unwrap();

        // (16, 0) would otherwise alias slot (0, 1).
        assert!(matches!(
            region.write_chunk(16, 0, b"aliased"),
            Err(WorldError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            region.read_chunk(16, 0),
            Err(WorldError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            region.remove_chunk(0, 16),
            Err(WorldError::InvalidCoordinate { .. })
        ));
        assert!(region.read_chunk(15, 15).unwrap().is_none());
        assert!(!region.contains(16, 0));
        assert!(!region.contains(300, 300));
        assert_eq!(region.read_chunk(0, 1).unwrap().unwrap(), b"below");
        assert_eq!(region.chunk_count(), 1);
    }

    #[test]
    fn overwrite_same_size_is_in_place() {
        let dir = ScratchDir::new("region_in_place").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        let mut region = Region::open(&path).unwrap();

        region.write_chunk(1, 2, &encode_chunk(&ids_with(1))).unwrap();
        region.write_chunk(2, 2, &encode_chunk(&ids_with(2))).unwrap();
        let len = region.file_len();
        assert_eq!(len, HEADER_SIZE + 2 * CHUNK_PAYLOAD_LEN as u64);

        region.write_chunk(1, 2, &encode_chunk(&ids_with(9))).unwrap();
        assert_eq!(region.file_len(), len);
        let first = region.read_chunk(1, 2).unwrap().unwrap();
        let second = region.read_chunk(2, 2).unwrap().unwrap();
        assert_eq!(decode_chunk(&first).unwrap(), ids_with(9));
        assert_eq!(decode_chunk(&second).unwrap(), ids_with(2));
    }

    #[test]
    fn different_length_appends() {
        let dir = ScratchDir::new("region_append").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        let mut region = Region::open(&path).unwrap();
        region.write_chunk(0, 0, b"short").unwrap();
        region.write_chunk(1, 0, b"neighbour").unwrap();
        region.write_chunk(0, 0, b"a longer payload").unwrap();

        assert_eq!(region.read_chunk(0, 0).unwrap().unwrap(), b"a longer payload");
        assert_eq!(region.read_chunk(1, 0).unwrap().unwrap(), b"neighbour");
        assert_eq!(
            region.file_len(),
            HEADER_SIZE + (5 + 9 + 16) as u64,
            "old bytes remain as garbage"
        );
    }

    #[test]
    fn directory_survives_reopen() {
        let dir = ScratchDir::new("region_reopen").unwrap();
        let path = dir.path().join("r.-1.3.rgn");
        {
            let mut region = Region::open(&path).unwrap();
            region.write_chunk(15, 15, &encode_chunk(&ids_with(13))).unwrap();
            region.sync().unwrap();
        }
        let mut region = Region::open_existing(&path).unwrap().unwrap();
        assert!(region.contains(15, 15));
        assert_eq!(region.chunk_count(), 1);
        let bytes = region.read_chunk(15, 15).unwrap().unwrap();
        assert_eq!(decode_chunk(&bytes).unwrap(), ids_with(13));
    }

    #[test]
    fn missing_file_is_absent_not_error() {
        let dir = ScratchDir::new("region_missing").unwrap();
        assert!(Region::open_existing(&dir.path().join("r.5.5.rgn"))
            .unwrap()
            .is_none());

        let mut store = RegionStore::new(dir.path(), 2).unwrap();
        assert_eq!(store.read_chunk_ids(ChunkPos::new(80, 80)).unwrap(), None);
        assert!(!store.region_path(5, 5).exists());
    }

    #[test]
    fn truncated_payload_is_corruption() {
        let dir = ScratchDir::new("region_truncated").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        {
            let mut region = Region::open(&path).unwrap();
            region.write_chunk(0, 0, &encode_chunk(&ids_with(0))).unwrap();
        }
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(HEADER_SIZE + 10).unwrap();
        drop(file);

        let mut region = Region::open_existing(&path).unwrap().unwrap();
        assert!(region.read_chunk(0, 0).unwrap_err().is_corruption());
    }

    #[test]
    fn remove_and_compact_reclaim_space() {
        let dir = ScratchDir::new("region_compact").unwrap();
        let path = dir.path().join("r.0.0.rgn");
        let mut region = Region::open(&path).unwrap();
        for lx in 0..4 {
            region
                .write_chunk(lx, 0, &encode_chunk(&ids_with(lx as TileId)))
                .unwrap();
        }
        assert!(region.remove_chunk(1, 0).unwrap());
        assert!(!region.remove_chunk(1, 0).unwrap());
        region.write_chunk(2, 0, b"resized").unwrap();

        let reclaimed = region.compact().unwrap();
        assert_eq!(reclaimed, 2 * CHUNK_PAYLOAD_LEN as u64);
        assert_eq!(region.chunk_count(), 3);
        assert_eq!(region.read_chunk(2, 0).unwrap().unwrap(), b"resized");
        let bytes = region.read_chunk(3, 0).unwrap().unwrap();
        assert_eq!(decode_chunk(&bytes).unwrap(), ids_with(3));

        drop(region);
        let region = Region::open_existing(&path).unwrap().unwrap();
        assert_eq!(region.chunk_count(), 3);
        assert_eq!(
            region.file_len(),
            HEADER_SIZE + (2 * CHUNK_PAYLOAD_LEN + 7) as u64
        );
    }

    #[test]
    fn store_round_trips_chunks_across_regions() {
        let dir = ScratchDir::new("region_store").unwrap();
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(8);
        let mut store = RegionStore::new(dir.path(), 1).unwrap();

        let positions = [
            ChunkPos::new(0, 0),
            ChunkPos::new(-1, -1),
            ChunkPos::new(16, 0),
        ];
        for (i, pos) in positions.iter().enumerate() {
            let kind = TileKind::ALL[i * 4];
            let tiles = vec![Tile::from_proto(registry.proto(kind), 0); CHUNK_AREA];
            store.save_chunk(&Chunk::generated(*pos, tiles)).unwrap();
        }
        assert_eq!(store.open_handles(), 1);

        for (i, pos) in positions.iter().enumerate() {
            let chunk = store.load_chunk(*pos, &registry, &mut rng).unwrap();
            assert!(!chunk.is_modified());
            assert_eq!(chunk.tile(CHUNK_SIZE - 1, 0).kind, TileKind::ALL[i * 4]);
        }
        assert!(store.region_path(-1, -1).exists());
    }

    #[test]
    fn store_treats_corrupt_chunks_as_absent() {
        let dir = ScratchDir::new("region_corrupt").unwrap();
        let registry = TileRegistry::standard();
        let mut rng = StdRng::seed_from_u64(8);
        let path = {
            let mut store = RegionStore::new(dir.path(), 4).unwrap();
            let tiles = vec![Tile::from_proto(registry.proto(TileKind::Sand), 0); CHUNK_AREA];
            store
                .save_chunk(&Chunk::generated(ChunkPos::new(2, 3), tiles))
                .unwrap();
            store.region_path(0, 0)
        };

        let mut bytes = fs::read(&path).unwrap();
        bytes[HEADER_SIZE as usize + 5] = 200;
        fs::write(&path, bytes).unwrap();

        let mut store = RegionStore::new(dir.path(), 4).unwrap();
        assert!(store
            .read_chunk_ids(ChunkPos::new(2, 3))
            .unwrap_err()
            .is_corruption());
        assert!(store
            .load_chunk(ChunkPos::new(2, 3), &registry, &mut rng)
            .is_none());
    }
}
