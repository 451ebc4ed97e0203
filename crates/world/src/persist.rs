//! World persistence.
//!
//! Chunks live in `.rg` region files grouping 32×32 chunks; each region is
//! a bincode map compressed with zstd and guarded by a CRC32. World-level
//! state (metadata, environment clock, players) is stored as JSON next to
//! the `regions/` directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crc32fast::Hasher;
use scapes_core::{EntityId, WorldSeed};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkMeta, ChunkPos, Voxel};
use crate::condition::ConditionState;

/// "SCRG": scapes region.
const REGION_MAGIC: u32 = 0x5343_5247;
const REGION_VERSION: u16 = 1;
const REGION_HEADER_LEN: usize = 14;
/// Region size in chunks along each horizontal axis.
const REGION_SIZE: i32 = 32;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone)]
struct RegionHeader {
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl RegionHeader {
    fn to_bytes(&self) -> [u8; REGION_HEADER_LEN] {
        let mut bytes = [0u8; REGION_HEADER_LEN];
        bytes[0..4].copy_from_slice(&REGION_MAGIC.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8; REGION_HEADER_LEN]) -> Result<Self> {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != REGION_MAGIC {
            anyhow::bail!(
                "Invalid region magic: expected 0x{:08X}, got 0x{:08X}",
                REGION_MAGIC,
                magic
            );
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != REGION_VERSION {
            anyhow::bail!("Unsupported region version {version}");
        }
        Ok(Self {
            version,
            crc32: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            payload_len: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
        })
    }
}

/// Persisted form of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub voxels: Vec<Voxel>,
    pub meta: ChunkMeta,
    pub populated: bool,
}

impl ChunkRecord {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            voxels: chunk.voxels().to_vec(),
            meta: chunk.meta(),
            populated: chunk.is_populated(),
        }
    }

    pub fn into_chunk(self, pos: ChunkPos) -> Result<Chunk> {
        let len = self.voxels.len();
        Chunk::from_parts(pos, self.voxels, self.meta, self.populated)
            .with_context(|| format!("Invalid chunk data at {pos}: {len} voxels"))
    }
}

type Region = BTreeMap<ChunkPos, ChunkRecord>;

fn chunk_to_region(pos: ChunkPos) -> (i32, i32) {
    (pos.x.div_euclid(REGION_SIZE), pos.y.div_euclid(REGION_SIZE))
}

/// Region file manager for saving and loading chunks.
pub struct RegionStore {
    region_dir: PathBuf,
}

impl RegionStore {
    /// Open (creating if needed) a region directory.
    pub fn new<P: AsRef<Path>>(region_dir: P) -> Result<Self> {
        let region_dir = region_dir.as_ref().to_path_buf();
        fs::create_dir_all(&region_dir).context("Failed to create region directory")?;
        Ok(Self { region_dir })
    }

    fn region_path(&self, region_x: i32, region_y: i32) -> PathBuf {
        self.region_dir.join(format!("r.{region_x}.{region_y}.rg"))
    }

    /// Save one chunk, rewriting its region file.
    pub fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.save_chunks(std::slice::from_ref(chunk))
    }

    /// Save a batch of chunks, touching each region file once.
    pub fn save_chunks<'a, I>(&self, chunks: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let mut grouped: BTreeMap<(i32, i32), Vec<&Chunk>> = BTreeMap::new();
        for chunk in chunks {
            grouped
                .entry(chunk_to_region(chunk.position()))
                .or_default()
                .push(chunk);
        }
        for ((region_x, region_y), chunks) in grouped {
            let mut region = self.load_region(region_x, region_y)?.unwrap_or_default();
            for chunk in chunks {
                region.insert(chunk.position(), ChunkRecord::from_chunk(chunk));
            }
            self.write_region(region_x, region_y, &region)?;
            debug!(region_x, region_y, chunks = region.len(), "region written");
        }
        Ok(())
    }

    /// Load a chunk; `Ok(None)` if it was never saved.
    pub fn load_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let (region_x, region_y) = chunk_to_region(pos);
        let Some(mut region) = self.load_region(region_x, region_y)? else {
            return Ok(None);
        };
        region
            .remove(&pos)
            .map(|record| record.into_chunk(pos))
            .transpose()
    }

    /// Whether the chunk has been saved.
    pub fn chunk_exists(&self, pos: ChunkPos) -> Result<bool> {
        let (region_x, region_y) = chunk_to_region(pos);
        Ok(self
            .load_region(region_x, region_y)?
            .is_some_and(|region| region.contains_key(&pos)))
    }

    fn load_region(&self, region_x: i32, region_y: i32) -> Result<Option<Region>> {
        let path = self.region_path(region_x, region_y);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to open region file {}", path.display()))
            }
        };

        let mut header_bytes = [0u8; REGION_HEADER_LEN];
        file.read_exact(&mut header_bytes)
            .context("Failed to read region header")?;
        let header = RegionHeader::from_bytes(&header_bytes)?;

        let mut compressed = vec![0u8; header.payload_len as usize];
        file.read_exact(&mut compressed)
            .context("Failed to read region payload")?;

        let mut hasher = Hasher::new();
        hasher.update(&compressed);
        let computed = hasher.finalize();
        if computed != header.crc32 {
            anyhow::bail!(
                "CRC32 mismatch in {}: expected {:08X}, got {:08X}",
                path.display(),
                header.crc32,
                computed
            );
        }

        let decompressed =
            zstd::decode_all(&compressed[..]).context("Failed to decompress region")?;
        let region: Region =
            bincode::deserialize(&decompressed).context("Failed to deserialize region")?;
        Ok(Some(region))
    }

    fn write_region(&self, region_x: i32, region_y: i32, region: &Region) -> Result<()> {
        let serialized = bincode::serialize(region).context("Failed to serialize region")?;
        let compressed =
            zstd::encode_all(&serialized[..], ZSTD_LEVEL).context("Failed to compress region")?;

        let mut hasher = Hasher::new();
        hasher.update(&compressed);
        let header = RegionHeader {
            version: REGION_VERSION,
            crc32: hasher.finalize(),
            payload_len: u32::try_from(compressed.len()).context("Region payload too large")?,
        };

        let mut bytes = Vec::with_capacity(REGION_HEADER_LEN + compressed.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&compressed);
        write_atomic(&self.region_path(region_x, region_y), &bytes)
    }
}

/// Contents of `world.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldMetadata {
    pub name: String,
    pub seed: WorldSeed,
    /// Spawn block, once found.
    #[serde(default)]
    pub spawn: Option<[i64; 3]>,
}

/// Contents of `environment.json`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentRecord {
    pub day_time: f64,
    pub day: i64,
    pub simulation_count: i64,
}

/// Contents of `players/<id>.json`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerRecord {
    #[serde(default)]
    pub condition: ConditionState,
    #[serde(default)]
    pub position: Option<[f64; 3]>,
}

/// Directory layout of one saved world.
pub struct WorldStore {
    root: PathBuf,
    regions: RegionStore,
}

impl WorldStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("players")).context("Failed to create world directory")?;
        let regions = RegionStore::new(root.join("regions"))?;
        Ok(Self { root, regions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn regions(&self) -> &RegionStore {
        &self.regions
    }

    pub fn load_metadata(&self) -> Result<Option<WorldMetadata>> {
        read_json(&self.root.join("world.json"))
    }

    pub fn save_metadata(&self, metadata: &WorldMetadata) -> Result<()> {
        write_json(&self.root.join("world.json"), metadata)
    }

    pub fn load_environment(&self) -> Result<Option<EnvironmentRecord>> {
        read_json(&self.root.join("environment.json"))
    }

    pub fn save_environment(&self, record: &EnvironmentRecord) -> Result<()> {
        write_json(&self.root.join("environment.json"), record)
    }

    fn player_path(&self, id: EntityId) -> PathBuf {
        self.root.join("players").join(format!("{}.json", id.0))
    }

    /// Load a player's record. A corrupt file is logged and treated as absent
    /// so the player respawns with defaults.
    pub fn load_player(&self, id: EntityId) -> Result<Option<PlayerRecord>> {
        let path = self.player_path(id);
        match read_json::<PlayerRecord>(&path) {
            Ok(record) => Ok(record.map(|mut record| {
                record.condition = record.condition.clamped();
                record
            })),
            Err(err) if path.exists() => {
                warn!(player = %id, error = %err, "discarding unreadable player file");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn save_player(&self, id: EntityId, record: &PlayerRecord) -> Result<()> {
        write_json(&self.player_path(id), record)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("Failed to read {}", path.display())),
    };
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_atomic(path, &bytes)
}

/// Write via a sibling temp file so readers never see a torn file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))
}
