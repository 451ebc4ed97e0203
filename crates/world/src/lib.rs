//! Procedural overworld generation and simulation state for scapes.

pub mod biome;
pub mod chunk;
pub mod climate;
pub mod cloud;
pub mod condition;
pub mod content;
pub mod generator;
pub mod noise;
pub mod persist;
pub mod populator;
mod storage;
pub mod terrain;

pub use biome::{BiomeGenerator, BiomeId, BiomeLookup};
pub use chunk::{blocks, BlockData, BlockId, Chunk, ChunkMeta, ChunkPos, DirtyFlags, Voxel};
pub use chunk::{CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME};
pub use climate::{ClimateClock, ClimateFields, ClimateGenerator, ClimateSample};
pub use cloud::{CloudBitmap, CloudGenerator};
pub use condition::{ConditionInputs, ConditionState, ConditionStep};
pub use content::{register_vanilla, ContentRegistry};
pub use generator::ChunkGenerator;
pub use persist::{
    ChunkRecord, EnvironmentRecord, PlayerRecord, RegionStore, WorldMetadata, WorldStore,
};
pub use populator::ChunkPopulatorOverworld;
pub use storage::ChunkStorage;
pub use terrain::{StoneType, TerrainGenerator, TerrainGeneratorLayer, TerrainGeneratorOutput};
pub use terrain::WATER_LEVEL;

use std::sync::Arc;

use scapes_core::{SeedStream, WorldSeed};

/// The bundled content, registered and locked.
pub fn vanilla_content() -> Arc<ContentRegistry> {
    let mut registry = ContentRegistry::new();
    register_vanilla(&mut registry);
    registry.lock();
    Arc::new(registry)
}

/// Every generator of one world, built from a single seed stream in the
/// fixed construction order.
#[derive(Clone)]
pub struct OverworldGenerators {
    pub terrain: Arc<TerrainGenerator>,
    pub climate: Arc<ClimateFields>,
    pub biomes: Arc<BiomeGenerator>,
    pub chunks: Arc<ChunkGenerator>,
    pub populator: Arc<ChunkPopulatorOverworld>,
}

impl OverworldGenerators {
    pub fn new(seed: WorldSeed, content: Arc<ContentRegistry>) -> Self {
        let mut seeds = SeedStream::new(seed);
        let terrain = Arc::new(TerrainGenerator::new(&mut seeds));
        let climate = Arc::new(ClimateFields::new(&mut seeds, terrain.clone()));
        let biomes = Arc::new(BiomeGenerator::new(climate.clone()));
        let chunks = Arc::new(ChunkGenerator::new(terrain.clone(), biomes.clone()));
        let populator = Arc::new(ChunkPopulatorOverworld::new(
            &mut seeds,
            terrain.clone(),
            biomes.clone(),
            content,
        ));
        Self {
            terrain,
            climate,
            biomes,
            chunks,
            populator,
        }
    }

    /// Generate and populate a chunk.
    pub fn build_chunk(&self, pos: ChunkPos) -> Chunk {
        let mut chunk = self.chunks.generate_chunk(pos);
        self.populator.populate(&mut chunk);
        chunk
    }
}
