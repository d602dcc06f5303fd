//! World metadata persistence (`level.dat`).
//!
//! Layout: magic `TCWD`, version byte, CRC32 and length of the payload (both
//! u32 LE), then a zstd-compressed bincode [`SaveRecord`]. Writes land in a
//! temporary file that is renamed over the old one.

use crate::agent::AgentRecord;
use crate::error::{IoContext, WorldError, WorldResult};
use crate::pathfinding::GridPos;
use crate::player::PlayerRecord;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// File name inside the world directory.
pub const LEVEL_FILE: &str = "level.dat";

const LEVEL_MAGIC: [u8; 4] = *b"TCWD";
const LEVEL_VERSION: u8 = 1;
const HEADER_LEN: usize = 13;
const ZSTD_LEVEL: i32 = 3;

/// Everything outside the chunk grid needed to resume a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub seed: u64,
    /// The 256-entry noise permutation in effect when the world was created.
    pub permutation: Vec<u8>,
    pub spawn: GridPos,
    pub ticks: u64,
    pub next_agent_id: u64,
    pub player: PlayerRecord,
    pub agents: Vec<AgentRecord>,
}

#[derive(Debug, Clone, Copy)]
struct LevelHeader {
    version: u8,
    crc32: u32,
    payload_len: u32,
}

impl LevelHeader {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(&LEVEL_MAGIC);
        bytes[4] = self.version;
        bytes[5..9].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[9..13].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> WorldResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(WorldError::corrupt("level header too short"));
        }
        if bytes[..4] != LEVEL_MAGIC {
            return Err(WorldError::corrupt(format!(
                "bad level magic {:02X?}",
                &bytes[..4]
            )));
        }
        let version = bytes[4];
        if version != LEVEL_VERSION {
            return Err(WorldError::corrupt(format!(
                "unsupported level version {version}"
            )));
        }
        Ok(Self {
            version,
            crc32: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            payload_len: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
        })
    }
}

pub fn level_path(world_dir: &Path) -> PathBuf {
    world_dir.join(LEVEL_FILE)
}

/// Serialize, compress and frame a record.
pub fn encode(record: &SaveRecord) -> WorldResult<Vec<u8>> {
    let serialized = bincode::serialize(record)
        .map_err(|err| WorldError::corrupt(format!("failed to serialize level: {err}")))?;
    let compressed = zstd::encode_all(&serialized[..], ZSTD_LEVEL)
        .io_context(|| "Failed to compress level")?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let header = LevelHeader {
        version: LEVEL_VERSION,
        crc32: hasher.finalize(),
        payload_len: compressed.len() as u32,
    };

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Validate and decode a framed record.
pub fn decode(bytes: &[u8]) -> WorldResult<SaveRecord> {
    let header = LevelHeader::from_bytes(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        return Err(WorldError::corrupt(format!(
            "level payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }

    let mut hasher = Hasher::new();
    hasher.update(payload);
    let computed = hasher.finalize();
    if computed != header.crc32 {
        return Err(WorldError::corrupt(format!(
            "level CRC32 mismatch: expected {:08X}, got {computed:08X}",
            header.crc32
        )));
    }

    let decompressed = zstd::decode_all(payload)
        .map_err(|err| WorldError::corrupt(format!("failed to decompress level: {err}")))?;
    bincode::deserialize(&decompressed)
        .map_err(|err| WorldError::corrupt(format!("failed to decode level: {err}")))
}

/// Atomically replace `level.dat` in `world_dir`.
#[instrument(skip(record), fields(world = %world_dir.display()))]
pub fn write_save(world_dir: &Path, record: &SaveRecord) -> WorldResult<()> {
    fs::create_dir_all(world_dir)
        .io_context(|| format!("Failed to create world directory {}", world_dir.display()))?;
    let bytes = encode(record)?;
    let path = level_path(world_dir);
    let tmp = path.with_extension("dat.tmp");
    fs::write(&tmp, &bytes).io_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &path)
        .io_context(|| format!("Failed to move {} into place", tmp.display()))?;
    debug!(bytes = bytes.len(), agents = record.agents.len(), "level saved");
    Ok(())
}

/// Read `level.dat`; `MissingSave` when the world has never been saved.
pub fn read_save(world_dir: &Path) -> WorldResult<SaveRecord> {
    let path = level_path(world_dir);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(WorldError::MissingSave { path });
        }
        Err(err) => {
            return Err(WorldError::io(format!("Failed to read {}", path.display()), err));
        }
    };
    decode(&bytes)
}
