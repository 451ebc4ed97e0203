//! Base chunk generation: turns terrain fields into voxels.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::biome::{BiomeGenerator, BiomeId};
use crate::chunk::{blocks, Chunk, ChunkPos, Voxel, CHUNK_HEIGHT, CHUNK_SIZE};
use crate::terrain::{StoneColumn, TerrainGenerator, TerrainGeneratorOutput, WATER_LEVEL};

const SOIL_DEPTH: usize = 3;
const SAND_DEPTH: usize = 4;
/// Cave ceilings keep at least this much rock below the surface.
const CAVE_ROOF: usize = 4;

/// Fills chunks with bedrock, stone strata, soil, caves, water and lava.
pub struct ChunkGenerator {
    terrain: Arc<TerrainGenerator>,
    biomes: Arc<BiomeGenerator>,
}

impl ChunkGenerator {
    pub fn new(terrain: Arc<TerrainGenerator>, biomes: Arc<BiomeGenerator>) -> Self {
        Self { terrain, biomes }
    }

    /// Generate the unpopulated chunk at `chunk_pos`.
    #[instrument(skip(self), fields(chunk = %chunk_pos))]
    pub fn generate_chunk(&self, chunk_pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(chunk_pos);
        let (origin_x, origin_y) = chunk_pos.origin();

        for local_y in 0..CHUNK_SIZE {
            for local_x in 0..CHUNK_SIZE {
                let x = (origin_x + local_x as i32) as f64;
                let y = (origin_y + local_y as i32) as f64;
                let layer = self.terrain.generate(x, y);
                let output = self.terrain.generate_output(x, y, &layer);
                let biome = self.biomes.get_with_layer(x, y, &layer);
                let stone = self.terrain.stone_column(x, y);
                fill_column(&mut chunk, local_x, local_y, &output, biome, &stone);
            }
        }

        debug!("chunk generated");
        chunk
    }
}

fn fill_column(
    chunk: &mut Chunk,
    x: usize,
    y: usize,
    output: &TerrainGeneratorOutput,
    biome: BiomeId,
    stone: &StoneColumn,
) {
    let surface = (output.height.floor() as usize).clamp(1, CHUNK_HEIGHT - 2);
    let water_level = WATER_LEVEL as usize;
    let submerged = surface < water_level;

    chunk.set_voxel(x, y, 0, Voxel::new(blocks::BEDROCK));
    for z in 1..=surface {
        let depth = surface - z;
        let voxel = if output.beach && depth < SAND_DEPTH {
            Voxel::new(blocks::SAND)
        } else if output.soiled && depth < SOIL_DEPTH {
            surface_voxel(biome, depth, submerged)
        } else {
            Voxel::with_data(blocks::STONE, stone.stone_type(z as i32).data())
        };
        chunk.set_voxel(x, y, z, voxel);
    }

    for z in surface + 1..water_level {
        chunk.set_voxel(x, y, z, Voxel::new(blocks::WATER));
    }
    if biome == BiomeId::Polar && submerged {
        chunk.set_voxel(x, y, water_level - 1, Voxel::new(blocks::ICE));
    }

    if output.cave > 0.0 {
        carve_cave(chunk, x, y, output, surface);
    }

    if output.lava_chance > 0.5 && !submerged {
        let depth = (output.lava_chance * 4.0).floor() as usize;
        for z in surface + 1..=(surface + depth).min(CHUNK_HEIGHT - 1) {
            chunk.set_voxel(x, y, z, Voxel::new(blocks::LAVA));
        }
    }
}

fn surface_voxel(biome: BiomeId, depth: usize, submerged: bool) -> Voxel {
    let top = biome.surface_block();
    let id = match (depth, top) {
        (0, blocks::GRASS) if submerged => blocks::DIRT,
        (0, top) => top,
        (_, blocks::SAND) => blocks::SAND,
        (_, blocks::GRAVEL) => blocks::GRAVEL,
        (_, blocks::GRASS) => blocks::DIRT,
        (_, top) => top,
    };
    Voxel::new(id)
}

fn carve_cave(
    chunk: &mut Chunk,
    x: usize,
    y: usize,
    output: &TerrainGeneratorOutput,
    surface: usize,
) {
    let Some(ceiling_limit) = surface.checked_sub(CAVE_ROOF) else {
        return;
    };
    let bottom = (output.cave_height - output.cave).floor().max(2.0) as usize;
    let top = ((output.cave_height + output.cave).ceil().max(0.0) as usize).min(ceiling_limit);
    for z in bottom..top {
        let voxel = if output.cave_river && z < bottom + 2 {
            Voxel::new(blocks::WATER)
        } else {
            Voxel::AIR
        };
        chunk.set_voxel(x, y, z, voxel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::ClimateFields;
    use scapes_core::{SeedStream, WorldSeed};

    fn generator(seed: u64) -> ChunkGenerator {
        let mut seeds = SeedStream::new(WorldSeed(seed));
        let terrain = Arc::new(TerrainGenerator::new(&mut seeds));
        let fields = Arc::new(ClimateFields::new(&mut seeds, terrain.clone()));
        ChunkGenerator::new(terrain, Arc::new(BiomeGenerator::new(fields)))
    }

    #[test]
    fn columns_have_bedrock_and_no_gap_at_sea_level() {
        let chunk = generator(42).generate_chunk(ChunkPos::new(3, -7));
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                assert_eq!(chunk.voxel(x, y, 0).id, blocks::BEDROCK);
                // Either ground or sea sits just below the water level.
                assert!(!chunk.voxel(x, y, WATER_LEVEL as usize - 1).is_air());
            }
        }
    }

    #[test]
    fn water_never_rises_above_sea_level() {
        let chunk = generator(7).generate_chunk(ChunkPos::new(0, 0));
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                for z in WATER_LEVEL as usize..CHUNK_HEIGHT {
                    assert_ne!(chunk.voxel(x, y, z).id, blocks::WATER);
                }
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generator(99).generate_chunk(ChunkPos::new(-2, 5));
        let b = generator(99).generate_chunk(ChunkPos::new(-2, 5));
        assert!(a.voxels() == b.voxels());
    }

    #[test]
    fn stone_carries_stone_type() {
        let chunk = generator(5).generate_chunk(ChunkPos::new(1, 1));
        let stones = chunk
            .voxels()
            .iter()
            .filter(|v| v.id == blocks::STONE)
            .count();
        assert!(stones > 0);
        assert!(chunk
            .voxels()
            .iter()
            .filter(|v| v.id == blocks::STONE)
            .all(|v| v.data < 7));
    }

    #[test]
    fn submerged_soil_is_dirt() {
        assert_eq!(surface_voxel(BiomeId::Plains, 0, true).id, blocks::DIRT);
        assert_eq!(surface_voxel(BiomeId::Plains, 0, false).id, blocks::GRASS);
        assert_eq!(surface_voxel(BiomeId::Plains, 1, false).id, blocks::DIRT);
        assert_eq!(surface_voxel(BiomeId::Desert, 2, false).id, blocks::SAND);
    }
}
