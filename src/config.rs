use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub world_name: String,
    /// Directory holding one subdirectory per world.
    pub save_dir: PathBuf,
    /// Seed for new worlds; random when unset.
    pub seed: Option<u64>,
    /// Real seconds per in-game day.
    pub day_length_seconds: f64,
    /// Main loop frequency in Hz.
    pub tick_rate: u32,
    /// Chunk radius kept loaded around spawn.
    pub load_radius: i32,
    /// Maximum resident chunks before eviction to disk.
    pub chunk_cache: usize,
    pub save_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            world_name: "overworld".to_string(),
            save_dir: PathBuf::from("saves"),
            seed: None,
            day_length_seconds: 1200.0,
            tick_rate: 20,
            load_radius: 2,
            chunk_cache: 256,
            save_interval_seconds: 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg.sanitized(),
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    warn!("Server config not found at {}. Using defaults", path.display());
                } else {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                ServerConfig::default()
            }
        }
    }

    /// Directory of the configured world.
    pub fn world_dir(&self) -> PathBuf {
        self.save_dir.join(&self.world_name)
    }

    fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            day_length_seconds: if self.day_length_seconds.is_finite()
                && self.day_length_seconds > 0.0
            {
                self.day_length_seconds
            } else {
                defaults.day_length_seconds
            },
            tick_rate: self.tick_rate.clamp(1, 1000),
            load_radius: self.load_radius.clamp(0, 32),
            chunk_cache: self.chunk_cache.max(1),
            save_interval_seconds: self.save_interval_seconds.max(1),
            ..self
        }
    }
}
