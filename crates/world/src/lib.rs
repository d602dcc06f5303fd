//! Tile world: noise terrain, chunk streaming with region persistence, and
//! agents that pathfind over the loaded grid.

mod agent;
mod brain;
mod chunk;
pub mod connectors;
mod error;
pub mod noise;
pub mod pathfinding;
mod player;
pub mod region;
pub mod save;
mod storage;
pub mod terrain;
mod tile;
mod time;
mod trees;
mod world;

pub use agent::*;
pub use brain::*;
pub use chunk::*;
pub use connectors::Connectors;
pub use error::{WorldError, WorldResult};
pub use noise::{Climate, NoiseChannel, Permutation};
pub use pathfinding::{find_path, smooth_path, valid_position, water_between, Connectivity, GridPos, TileView};
pub use player::*;
pub use region::{Region, RegionStore};
pub use save::SaveRecord;
pub use storage::*;
pub use terrain::{Biome, TerrainGenerator};
pub use tile::*;
pub use time::*;
pub use trees::TreeType;
pub use world::*;
