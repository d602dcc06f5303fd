use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use tilecraft_world::WorldConfig;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/tilecraft.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Chunk streaming and simulation tuning.
    pub world: WorldConfig,
    /// World directory used when `--save-dir` is not given.
    pub save_dir: PathBuf,
    /// Ticks between autosaves; 0 disables autosave.
    pub autosave_interval: u64,
    /// Ticks to run when `--ticks` is not given.
    pub ticks: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            save_dir: PathBuf::from("saves/world"),
            autosave_interval: 6000,
            ticks: 1200,
        }
    }
}

impl GameConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<GameConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    GameConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => GameConfig::default(),
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                GameConfig::default()
            }
        }
    }
}
