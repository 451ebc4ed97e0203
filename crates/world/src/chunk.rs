use std::fmt;

use serde::{Deserialize, Serialize};

/// Chunk width (X axis) in voxels.
pub const CHUNK_SIZE: usize = 16;
/// Chunk height (Z axis, vertical) in voxels.
pub const CHUNK_HEIGHT: usize = 512;
/// Total voxel count per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_HEIGHT;

/// Block identifier.
pub type BlockId = u16;
/// Block data bits (stone type, snow depth, ...).
pub type BlockData = u16;

/// Block ids of the overworld.
pub mod blocks {
    use super::BlockId;

    pub const AIR: BlockId = 0;
    /// Data carries the stone type.
    pub const STONE: BlockId = 1;
    pub const DIRT: BlockId = 2;
    pub const GRASS: BlockId = 3;
    pub const SAND: BlockId = 4;
    pub const GRAVEL: BlockId = 5;
    pub const WATER: BlockId = 6;
    pub const ICE: BlockId = 7;
    /// Data carries the snow depth, `0..=7`.
    pub const SNOW: BlockId = 8;
    pub const LAVA: BlockId = 9;
    pub const BEDROCK: BlockId = 10;
    pub const COBBLESTONE: BlockId = 11;
    pub const STONE_BRICKS: BlockId = 12;

    // Ores; data carries the host stone type.
    pub const COAL_ORE: BlockId = 14;
    pub const COPPER_ORE: BlockId = 15;
    pub const TIN_ORE: BlockId = 16;
    pub const IRON_ORE: BlockId = 17;
    pub const GOLD_ORE: BlockId = 18;
    pub const SILVER_ORE: BlockId = 19;
    pub const SULFUR_ORE: BlockId = 20;
    pub const CRYSTAL_ORE: BlockId = 21;

    pub const TALL_GRASS: BlockId = 30;
    pub const FLOWER: BlockId = 31;
    pub const BUSH: BlockId = 32;
    pub const CACTUS: BlockId = 33;
    pub const LOG: BlockId = 34;
    pub const LEAVES: BlockId = 35;
    /// Loose surface rock; data carries the ore it hints at.
    pub const ROCK: BlockId = 36;

    /// Maximum snow depth stored in snow data.
    pub const MAX_SNOW_DEPTH: u16 = 7;

    /// Blocks that occupy space without being solid ground.
    pub fn is_replaceable(id: BlockId) -> bool {
        matches!(id, AIR | TALL_GRASS | FLOWER | SNOW)
    }

    pub fn is_fluid(id: BlockId) -> bool {
        matches!(id, WATER | LAVA)
    }

    /// Ground a plant or snow layer can rest on.
    pub fn is_solid(id: BlockId) -> bool {
        !is_replaceable(id) && !is_fluid(id) && !matches!(id, BUSH | CACTUS | LEAVES | ROCK)
    }
}

/// Chunk-local position; `z` is vertical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalPos {
    /// Convert to a linear index within the voxel array.
    pub fn index(self) -> usize {
        debug_assert!(self.x < CHUNK_SIZE);
        debug_assert!(self.y < CHUNK_SIZE);
        debug_assert!(self.z < CHUNK_HEIGHT);
        (self.z * CHUNK_SIZE + self.y) * CHUNK_SIZE + self.x
    }
}

/// Chunk coordinate (X,Y) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the world column `(x, y)`.
    pub fn containing(x: i32, y: i32) -> Self {
        Self {
            x: x.div_euclid(CHUNK_SIZE as i32),
            y: y.div_euclid(CHUNK_SIZE as i32),
        }
    }

    /// World coordinate of the chunk's minimum corner.
    pub fn origin(self) -> (i32, i32) {
        (self.x * CHUNK_SIZE as i32, self.y * CHUNK_SIZE as i32)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Per-voxel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Voxel {
    pub id: BlockId,
    pub data: BlockData,
}

impl Voxel {
    pub const AIR: Voxel = Voxel::new(blocks::AIR);

    pub const fn new(id: BlockId) -> Self {
        Self { id, data: 0 }
    }

    pub const fn with_data(id: BlockId, data: BlockData) -> Self {
        Self { id, data }
    }

    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == blocks::AIR
    }
}

/// Persisted chunk metadata tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Global simulation count at which seasonal simulation last ran; 0 = never.
    #[serde(rename = "SimulationCount")]
    pub simulation_count: i64,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Dirty flags set whenever chunk data changes.
    pub struct DirtyFlags: u8 {
        /// Voxels changed since the last take.
        const BLOCKS = 0b0000_0001;
        /// Metadata changed since the last take.
        const META = 0b0000_0010;
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        DirtyFlags::empty()
    }
}

/// Chunk storing a 16×16×512 voxel column block plus metadata.
#[derive(Clone)]
pub struct Chunk {
    position: ChunkPos,
    voxels: Vec<Voxel>,
    meta: ChunkMeta,
    populated: bool,
    dirty: DirtyFlags,
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("position", &self.position)
            .field("meta", &self.meta)
            .field("populated", &self.populated)
            .finish_non_exhaustive()
    }
}

impl Chunk {
    /// Allocate a fresh chunk filled with air.
    pub fn new(position: ChunkPos) -> Self {
        Self {
            position,
            voxels: vec![Voxel::AIR; CHUNK_VOLUME],
            meta: ChunkMeta::default(),
            populated: false,
            dirty: DirtyFlags::all(),
        }
    }

    /// Rebuild a chunk from persisted parts. Returns `None` when the voxel
    /// array has the wrong length.
    pub fn from_parts(
        position: ChunkPos,
        voxels: Vec<Voxel>,
        meta: ChunkMeta,
        populated: bool,
    ) -> Option<Self> {
        if voxels.len() != CHUNK_VOLUME {
            return None;
        }
        Some(Self {
            position,
            voxels,
            meta,
            populated,
            dirty: DirtyFlags::empty(),
        })
    }

    #[inline]
    pub fn position(&self) -> ChunkPos {
        self.position
    }

    fn index(x: usize, y: usize, z: usize) -> usize {
        LocalPos { x, y, z }.index()
    }

    /// Fetch a voxel copy.
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Voxel {
        self.voxels[Self::index(x, y, z)]
    }

    /// Set a voxel and mark the chunk dirty if it changed.
    pub fn set_voxel(&mut self, x: usize, y: usize, z: usize, voxel: Voxel) {
        let idx = Self::index(x, y, z);
        if self.voxels[idx] != voxel {
            self.voxels[idx] = voxel;
            self.dirty.insert(DirtyFlags::BLOCKS);
        }
    }

    /// Whether the world block position lies inside this chunk.
    pub fn contains_world(&self, x: i32, y: i32, z: i32) -> bool {
        let (ox, oy) = self.position.origin();
        (ox..ox + CHUNK_SIZE as i32).contains(&x)
            && (oy..oy + CHUNK_SIZE as i32).contains(&y)
            && (0..CHUNK_HEIGHT as i32).contains(&z)
    }

    /// Voxel at a world position, `None` outside this chunk.
    pub fn world_voxel(&self, x: i32, y: i32, z: i32) -> Option<Voxel> {
        if !self.contains_world(x, y, z) {
            return None;
        }
        let (ox, oy) = self.position.origin();
        Some(self.voxel((x - ox) as usize, (y - oy) as usize, z as usize))
    }

    /// Set a voxel by world position; writes outside this chunk are dropped.
    pub fn set_world_voxel_if_in_chunk(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) -> bool {
        if !self.contains_world(x, y, z) {
            return false;
        }
        let (ox, oy) = self.position.origin();
        self.set_voxel((x - ox) as usize, (y - oy) as usize, z as usize, voxel);
        true
    }

    /// Highest non-air block of a local column.
    pub fn highest_block_z(&self, x: usize, y: usize) -> Option<usize> {
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|&z| !self.voxel(x, y, z).is_air())
    }

    /// Borrow raw voxel storage for persistence.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    pub fn meta(&self) -> ChunkMeta {
        self.meta
    }

    pub fn set_simulation_count(&mut self, count: i64) {
        if self.meta.simulation_count != count {
            self.meta.simulation_count = count;
            self.dirty.insert(DirtyFlags::META);
        }
    }

    /// Whether the decoration pass already ran.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn mark_populated(&mut self) {
        self.populated = true;
        self.dirty.insert(DirtyFlags::META);
    }

    /// Whether any change is pending write-back.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Consume and return the current dirty flags.
    pub fn take_dirty_flags(&mut self) -> DirtyFlags {
        let flags = self.dirty;
        self.dirty = DirtyFlags::empty();
        flags
    }
}
