//! Overworld chunk decoration: ore veins, surface rocks, ruins and biome
//! decorators.
//!
//! All randomness comes from a chunk-local RNG seeded by the chunk
//! coordinate and the populator's seed offset, plus the seeded decorator
//! layers, so a chunk decorates identically whenever it is generated.
//! Structures crossing the chunk border are clipped to the chunk.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use scapes_core::{chunk_rng, SeedStream};
use tracing::{debug, instrument};

use crate::biome::BiomeGenerator;
use crate::chunk::{blocks, Chunk, Voxel, CHUNK_HEIGHT, CHUNK_SIZE};
use crate::content::{BiomeDecorator, ContentRegistry, OreType, Placement};
use crate::noise::{NoiseOffsetLayer, PermutationLayer, RandomLayer, SwirlLayer};
use crate::terrain::{StoneType, TerrainGenerator, WATER_LEVEL};

/// Columns per sampling pass.
const COLUMNS_PER_PASS: usize = 64;
/// One ruin in this many passes.
const RUIN_RARITY: u32 = 400;
/// Maximum jitter used to probe for a neighbouring stone type.
const BOUNDARY_PROBE: i32 = 8;

const RUIN_SIZE: i32 = 5;
const RUIN_MAX_WALL: i32 = 3;

/// Side of one decorator region before displacement, in blocks.
const DECORATOR_CELL: i32 = 128;
const DECORATOR_SWIRL: i32 = 24;
const DECORATOR_NOISE_SCALE: f64 = 512.0;
const DECORATOR_NOISE_AMPLITUDE: f64 = 64.0;

type DecoratorLayer = NoiseOffsetLayer<SwirlLayer<PermutationLayer>>;

/// Decorates freshly generated overworld chunks.
pub struct ChunkPopulatorOverworld {
    terrain: Arc<TerrainGenerator>,
    biomes: Arc<BiomeGenerator>,
    content: Arc<ContentRegistry>,
    seed_offset: i64,
    decorator_layer: DecoratorLayer,
}

impl ChunkPopulatorOverworld {
    /// Draws the seed offset, then the base, swirl and noise layer seeds.
    pub fn new(
        seeds: &mut SeedStream,
        terrain: Arc<TerrainGenerator>,
        biomes: Arc<BiomeGenerator>,
        content: Arc<ContentRegistry>,
    ) -> Self {
        let seed_offset = seeds.next_seed() as i64;
        let base = PermutationLayer::with_cell(seeds.next_seed(), DECORATOR_CELL);
        let swirl = SwirlLayer::new(base, seeds.next_seed(), DECORATOR_SWIRL);
        let decorator_layer = NoiseOffsetLayer::new(
            swirl,
            seeds.next_noise_seed(),
            DECORATOR_NOISE_SCALE,
            DECORATOR_NOISE_AMPLITUDE,
        );
        Self {
            terrain,
            biomes,
            content,
            seed_offset,
            decorator_layer,
        }
    }

    /// Decorate a chunk once; already populated chunks are left untouched.
    #[instrument(skip(self, chunk), fields(chunk = %chunk.position()))]
    pub fn populate(&self, chunk: &mut Chunk) {
        if chunk.is_populated() {
            return;
        }
        let pos = chunk.position();
        let mut rng = chunk_rng(pos.x, pos.y, self.seed_offset);

        let mut veins = 0;
        let mut ruins = 0;
        for _ in 0..CHUNK_SIZE * CHUNK_SIZE / COLUMNS_PER_PASS {
            if rng.gen_ratio(1, RUIN_RARITY) && self.place_ruin(chunk, &mut rng) {
                ruins += 1;
            }
            if self.try_ore_vein(chunk, &mut rng) {
                veins += 1;
            }
        }
        self.decorate(chunk, &mut rng);
        chunk.mark_populated();
        debug!(veins, ruins, "chunk populated");
    }

    /// Selector value shared by every column of the chunk.
    pub fn decorator_roll(&self, chunk_x: i32, chunk_y: i32) -> u32 {
        let center_x = chunk_x.wrapping_mul(CHUNK_SIZE as i32).wrapping_add(8);
        let center_y = chunk_y.wrapping_mul(CHUNK_SIZE as i32).wrapping_add(8);
        self.decorator_layer.random(center_x, center_y, u32::MAX)
    }

    fn try_ore_vein(&self, chunk: &mut Chunk, rng: &mut StdRng) -> bool {
        let (origin_x, origin_y) = chunk.position().origin();
        let lx = rng.gen_range(0..CHUNK_SIZE);
        let ly = rng.gen_range(0..CHUNK_SIZE);
        let Some(surface) = chunk.highest_block_z(lx, ly) else {
            return false;
        };
        let surface = surface as i32;
        if surface <= 8 {
            return false;
        }
        let x = origin_x + lx as i32;
        let y = origin_y + ly as i32;
        let z = rng.gen_range(4..surface - 4);

        let host = chunk.voxel(lx, ly, z as usize);
        if host.id != blocks::STONE {
            return false;
        }
        let stone = StoneType::from_data(host.data);
        let probe = self.terrain.stone_type(
            (x + rng.gen_range(-BOUNDARY_PROBE..=BOUNDARY_PROBE)) as f64,
            (y + rng.gen_range(-BOUNDARY_PROBE..=BOUNDARY_PROBE)) as f64,
            z + rng.gen_range(-BOUNDARY_PROBE..=BOUNDARY_PROBE),
        );
        if probe == stone {
            return false;
        }

        for ore in self.content.ores() {
            if !ore.stone_types.contains(&stone) || rng.gen_range(0..ore.rarity.max(1)) != 0 {
                continue;
            }
            let size = rng.gen_range(ore.size.clone());
            place_vein(chunk, rng, ore, (x, y, z), size);
            if ore.rock_chance > 0
                && surface - z <= ore.rock_distance as i32
                && rng.gen_range(0..ore.rock_chance) == 0
            {
                let rx = x + rng.gen_range(-2..=2);
                let ry = y + rng.gen_range(-2..=2);
                place_on_surface(chunk, rx, ry, Voxel::with_data(blocks::ROCK, ore.block));
            }
            return true;
        }
        false
    }

    fn place_ruin(&self, chunk: &mut Chunk, rng: &mut StdRng) -> bool {
        let (origin_x, origin_y) = chunk.position().origin();
        let lx = rng.gen_range(0..CHUNK_SIZE);
        let ly = rng.gen_range(0..CHUNK_SIZE);
        let wall_height = rng.gen_range(1..=RUIN_MAX_WALL);
        let Some(base) = chunk.highest_block_z(lx, ly) else {
            return false;
        };
        let base = base as i32;
        if base < WATER_LEVEL || base + RUIN_MAX_WALL + 1 >= CHUNK_HEIGHT as i32 {
            return false;
        }
        let start_x = origin_x + lx as i32 - RUIN_SIZE / 2;
        let start_y = origin_y + ly as i32 - RUIN_SIZE / 2;

        for dy in 0..RUIN_SIZE {
            for dx in 0..RUIN_SIZE {
                let (x, y) = (start_x + dx, start_y + dy);
                chunk.set_world_voxel_if_in_chunk(x, y, base, Voxel::new(blocks::COBBLESTONE));
                let wall = dx == 0 || dy == 0 || dx == RUIN_SIZE - 1 || dy == RUIN_SIZE - 1;
                for dz in 1..=RUIN_MAX_WALL {
                    let voxel = if wall && dz <= wall_height && !rng.gen_ratio(1, 3) {
                        if rng.gen_bool(0.5) {
                            Voxel::new(blocks::STONE_BRICKS)
                        } else {
                            Voxel::new(blocks::COBBLESTONE)
                        }
                    } else {
                        Voxel::AIR
                    };
                    chunk.set_world_voxel_if_in_chunk(x, y, base + dz, voxel);
                }
            }
        }
        true
    }

    /// Decorator applied to every column of the chunk, chosen from the
    /// biome at the chunk centre.
    pub fn chunk_decorator(&self, chunk_x: i32, chunk_y: i32) -> Option<&BiomeDecorator> {
        let center_x = chunk_x.wrapping_mul(CHUNK_SIZE as i32).wrapping_add(8);
        let center_y = chunk_y.wrapping_mul(CHUNK_SIZE as i32).wrapping_add(8);
        let biome = self.biomes.get(center_x as f64, center_y as f64);
        self.content
            .select_decorator(biome, self.decorator_roll(chunk_x, chunk_y))
    }

    fn decorate(&self, chunk: &mut Chunk, rng: &mut StdRng) {
        let pos = chunk.position();
        let Some(decorator) = self.chunk_decorator(pos.x, pos.y) else {
            return;
        };
        let (origin_x, origin_y) = pos.origin();
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let Some(top) = chunk.highest_block_z(lx, ly) else {
                    continue;
                };
                let ground = chunk.voxel(lx, ly, top).id;
                for entry in &decorator.entries {
                    if rng.gen::<f64>() >= entry.chance || !entry.ground.accepts(ground) {
                        continue;
                    }
                    let (x, y) = (origin_x + lx as i32, origin_y + ly as i32);
                    place(chunk, rng, &entry.placement, x, y, top as i32 + 1);
                    break;
                }
            }
        }
    }
}

/// Random walk converting host stone into ore; keeps the stone type as data.
fn place_vein(
    chunk: &mut Chunk,
    rng: &mut StdRng,
    ore: &OreType,
    start: (i32, i32, i32),
    size: u32,
) {
    let (mut x, mut y, mut z) = start;
    for _ in 0..size {
        let convert = rng.gen::<f64>() < ore.chance;
        if convert {
            if let Some(voxel) = chunk.world_voxel(x, y, z) {
                let host = StoneType::from_data(voxel.data);
                if voxel.id == blocks::STONE && ore.stone_types.contains(&host) {
                    chunk.set_world_voxel_if_in_chunk(
                        x,
                        y,
                        z,
                        Voxel::with_data(ore.block, voxel.data),
                    );
                }
            }
        }
        match rng.gen_range(0..6) {
            0 => x += 1,
            1 => x -= 1,
            2 => y += 1,
            3 => y -= 1,
            4 => z += 1,
            _ => z -= 1,
        }
    }
}

fn place_on_surface(chunk: &mut Chunk, x: i32, y: i32, voxel: Voxel) {
    let (origin_x, origin_y) = chunk.position().origin();
    let (lx, ly) = (x - origin_x, y - origin_y);
    if !(0..CHUNK_SIZE as i32).contains(&lx) || !(0..CHUNK_SIZE as i32).contains(&ly) {
        return;
    }
    let Some(top) = chunk.highest_block_z(lx as usize, ly as usize) else {
        return;
    };
    if blocks::is_solid(chunk.voxel(lx as usize, ly as usize, top).id) {
        chunk.set_world_voxel_if_in_chunk(x, y, top as i32 + 1, voxel);
    }
}

fn place(chunk: &mut Chunk, rng: &mut StdRng, placement: &Placement, x: i32, y: i32, z: i32) {
    match placement {
        Placement::Single(block) => {
            set_if_air(chunk, x, y, z, Voxel::new(*block));
        }
        Placement::Column { block, height } => {
            let height = rng.gen_range(height.clone()) as i32;
            for dz in 0..height {
                set_if_air(chunk, x, y, z + dz, Voxel::new(*block));
            }
        }
        Placement::Tree { height, radius } => {
            let height = rng.gen_range(height.clone()) as i32;
            let radius = *radius as i32;
            for dz in 0..height {
                set_if_air(chunk, x, y, z + dz, Voxel::new(blocks::LOG));
            }
            let top = z + height - 1;
            for dz in -radius..=radius {
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        if dx * dx + dy * dy + dz * dz <= radius * radius + 1 {
                            let leaves = Voxel::new(blocks::LEAVES);
                            set_if_air(chunk, x + dx, y + dy, top + dz, leaves);
                        }
                    }
                }
            }
        }
    }
}

fn set_if_air(chunk: &mut Chunk, x: i32, y: i32, z: i32, voxel: Voxel) {
    if chunk.world_voxel(x, y, z).is_some_and(|v| blocks::is_replaceable(v.id)) {
        chunk.set_world_voxel_if_in_chunk(x, y, z, voxel);
    }
}
