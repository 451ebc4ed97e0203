//! Raw terrain fields for world columns.
//!
//! [`TerrainGenerator::generate`] is a pure function of (seed, x, y): the
//! same inputs always produce bit-identical layers, which multiplayer
//! consistency and regeneration after unload depend on. Noise layers are
//! seeded from the world [`SeedStream`] in declaration order.

use crate::chunk::CHUNK_HEIGHT;
use crate::noise::{NoiseConfig, NoiseGenerator};
use scapes_core::SeedStream;
use serde::{Deserialize, Serialize};

/// Height of the sea surface.
pub const WATER_LEVEL: i32 = 256;

/// Highest height a column may reach.
pub const MAX_TERRAIN_HEIGHT: f64 = CHUNK_HEIGHT as f64 - 2.0;

/// Lowest height a column may reach (ocean floor).
pub const MIN_TERRAIN_HEIGHT: f64 = 16.0;

/// Terrain factor at which land meets the ocean.
pub const LAND_THRESHOLD: f64 = 0.2;

const TERRAIN_SCALE: f64 = 320.0;
const MOUNTAIN_HEIGHT: f64 = 112.0;
const VOLCANO_HEIGHT: f64 = 72.0;
const VOLCANO_CRATER: f64 = 0.85;
const CRATER_DEPTH: f64 = 28.0;
const RIVER_LIMIT: f64 = 16.0;
const RIVER_BOTTOM: f64 = WATER_LEVEL as f64 - 5.0;
const CANYON_DEPTH: f64 = 40.0;
const STONE_BAND: f64 = 40.0;

/// Geological stone variants; stored as voxel data of stone and ore blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum StoneType {
    Granite = 0,
    Diorite = 1,
    Andesite = 2,
    Basalt = 3,
    Limestone = 4,
    Sandstone = 5,
    Marble = 6,
}

impl StoneType {
    /// Strata order used by the layered stone field.
    pub const ALL: [StoneType; 7] = [
        StoneType::Granite,
        StoneType::Diorite,
        StoneType::Andesite,
        StoneType::Basalt,
        StoneType::Limestone,
        StoneType::Sandstone,
        StoneType::Marble,
    ];

    /// Voxel data value.
    pub fn data(self) -> u16 {
        self as u16
    }

    /// Inverse of [`StoneType::data`]; unknown values fall back to granite.
    pub fn from_data(data: u16) -> Self {
        Self::ALL
            .get(data as usize)
            .copied()
            .unwrap_or(StoneType::Granite)
    }
}

/// First-stage fields of one column.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerrainGeneratorLayer {
    /// Reshaped continent factor; below [`LAND_THRESHOLD`] is ocean.
    pub terrain_factor: f64,
    pub mountain_factor: f64,
    pub volcano_factor: f64,
    /// River multiplier in `[0, 1]`, zero on a river's centre line.
    pub river: f64,
    /// Depth carved by a canyon.
    pub canyon: f64,
    /// Final surface height.
    pub height: f64,
}

/// Second-stage column flags consumed by chunk generation and decoration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerrainGeneratorOutput {
    pub height: f64,
    /// Tunnel half-height; zero where no cave runs.
    pub cave: f64,
    pub cave_height: f64,
    /// Cave floor is flooded.
    pub cave_river: bool,
    /// Surface carries soil (dirt/grass) instead of bare rock.
    pub soiled: bool,
    pub beach: bool,
    /// Probability of lava filling the column's crater, `[0, 1]`.
    pub lava_chance: f64,
}

/// Strata parameters of one column; cheap per-block stone type lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoneColumn {
    shift: f64,
    offset: i64,
}

impl StoneColumn {
    /// Stone type at height `z` in this column.
    pub fn stone_type(&self, z: i32) -> StoneType {
        let band = ((z as f64 + self.shift) / STONE_BAND).floor() as i64 + self.offset;
        StoneType::ALL[band.rem_euclid(StoneType::ALL.len() as i64) as usize]
    }
}

/// Terrain generator combining the terrain noise layers.
pub struct TerrainGenerator {
    terrain: NoiseGenerator,
    detail: NoiseGenerator,
    mountain: NoiseGenerator,
    mountain_height: NoiseGenerator,
    volcano: NoiseGenerator,
    volcano_height: NoiseGenerator,
    river: NoiseGenerator,
    canyon: NoiseGenerator,
    canyon_depth: NoiseGenerator,
    cave: NoiseGenerator,
    cave_height: NoiseGenerator,
    stone: NoiseGenerator,
    stone_offset: NoiseGenerator,
}

impl TerrainGenerator {
    /// Construct all terrain noise layers, drawing seeds in a fixed order.
    pub fn new(seeds: &mut SeedStream) -> Self {
        Self {
            terrain: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 8, 16384.0)),
            detail: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 3, 64.0)),
            mountain: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 4, 2048.0)),
            mountain_height: NoiseGenerator::new(NoiseConfig::new(
                seeds.next_noise_seed(),
                2,
                4096.0,
            )),
            volcano: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 2, 4096.0)),
            volcano_height: NoiseGenerator::new(NoiseConfig::new(
                seeds.next_noise_seed(),
                2,
                2048.0,
            )),
            river: NoiseGenerator::new(
                NoiseConfig::new(seeds.next_noise_seed(), 4, 4096.0).persistence(0.4),
            ),
            canyon: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 3, 1024.0)),
            canyon_depth: NoiseGenerator::new(NoiseConfig::new(
                seeds.next_noise_seed(),
                2,
                2048.0,
            )),
            cave: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 3, 256.0)),
            cave_height: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 2, 512.0)),
            stone: NoiseGenerator::new(NoiseConfig::new(seeds.next_noise_seed(), 2, 256.0)),
            stone_offset: NoiseGenerator::new(NoiseConfig::new(
                seeds.next_noise_seed(),
                2,
                2048.0,
            )),
        }
    }

    /// Continent factor reshaped by piecewise dampening.
    ///
    /// Land is flattened in three steps above 0.3/0.35/0.4, oceans are
    /// deepened in two steps below 0.2/0.15.
    pub fn terrain_factor(&self, x: f64, y: f64) -> f64 {
        let mut factor = self.terrain.sample_2d(x, y) * 1.5 + 0.35;
        if factor > 0.3 {
            factor = 0.3 + (factor - 0.3) * 0.8;
        }
        if factor > 0.35 {
            factor = 0.35 + (factor - 0.35) * 0.5;
        }
        if factor > 0.4 {
            factor = 0.4 + (factor - 0.4) * 0.25;
        }
        if factor < 0.2 {
            factor = 0.2 - (0.2 - factor) * 1.2;
        }
        if factor < 0.15 {
            factor = 0.15 - (0.15 - factor) * 1.5;
        }
        factor
    }

    /// First stage: height and feature fields of the column at `(x, y)`.
    pub fn generate(&self, x: f64, y: f64) -> TerrainGeneratorLayer {
        let terrain_factor = self.terrain_factor(x, y);
        let mut height = WATER_LEVEL as f64 + (terrain_factor - LAND_THRESHOLD) * TERRAIN_SCALE;
        height += self.detail.sample_2d(x, y) * 2.0;

        let mountain_gate = (terrain_factor * 4.0 - 0.4).clamp(0.0, 1.0);
        let ridge = self.mountain.ridged_2d(x, y);
        let mountain_factor =
            (ridge * ridge * self.mountain_height.sample_2d_01(x, y) * mountain_gate)
                .clamp(0.0, 1.0);
        height += mountain_factor * MOUNTAIN_HEIGHT;

        let volcano = self.volcano.sample_2d(x, y) * 8.0;
        let volcano_band = (1.0 - volcano * volcano).max(0.0);
        let volcano_gate = (self.volcano_height.sample_2d(x, y) * 2.5 - 0.5).clamp(0.0, 1.0);
        let volcano_factor = (volcano_band * volcano_gate * mountain_gate).clamp(0.0, 1.0);
        height += volcano_factor * VOLCANO_HEIGHT;
        if volcano_factor > VOLCANO_CRATER {
            height -= (volcano_factor - VOLCANO_CRATER) / (1.0 - VOLCANO_CRATER) * CRATER_DEPTH;
        }

        let river_factor = (1.0 - mountain_factor * 2.0 - volcano_factor).clamp(0.0, 1.0)
            * ((terrain_factor - LAND_THRESHOLD) * 20.0).clamp(0.0, 1.0);
        let river_noise = 1.0 - self.river.sample_2d(x, y).abs();
        let river = (RIVER_LIMIT - river_noise * river_noise * RIVER_LIMIT * river_factor)
            .clamp(0.0, 1.0);
        if height > RIVER_BOTTOM {
            height = RIVER_BOTTOM + (height - RIVER_BOTTOM) * river;
        }

        let canyon_ridge = self.canyon.ridged_2d(x, y);
        let canyon_shape = ((canyon_ridge - 0.94) / 0.06).clamp(0.0, 1.0);
        let depth_factor = (self.canyon_depth.sample_2d(x, y) * 2.0).clamp(0.0, 1.0);
        let canyon = canyon_shape * depth_factor * CANYON_DEPTH;
        if height > RIVER_BOTTOM {
            height = (height - canyon).max(RIVER_BOTTOM);
        }

        TerrainGeneratorLayer {
            terrain_factor,
            mountain_factor,
            volcano_factor,
            river,
            canyon,
            height: height.clamp(MIN_TERRAIN_HEIGHT, MAX_TERRAIN_HEIGHT),
        }
    }

    /// Second stage: cave and surface flags derived from a first-stage layer.
    pub fn generate_output(
        &self,
        x: f64,
        y: f64,
        layer: &TerrainGeneratorLayer,
    ) -> TerrainGeneratorOutput {
        let height = layer.height;
        let water = WATER_LEVEL as f64;

        let cave_ridge = self.cave.ridged_2d(x, y);
        let cave = ((cave_ridge - 0.92) / 0.08).clamp(0.0, 1.0) * 6.0;
        let cave_height = water - 48.0 + self.cave_height.sample_2d(x, y) * 32.0;
        let cave_river = cave > 3.6 && cave_height < water - 60.0;

        let beach = height > water - 3.0
            && height < water + 2.5
            && layer.mountain_factor < 0.1
            && layer.river > 0.5;
        let soiled =
            layer.mountain_factor < 0.55 && layer.volcano_factor < 0.35 && height < water + 160.0;
        let lava_chance = if layer.volcano_factor > VOLCANO_CRATER {
            (layer.volcano_factor - VOLCANO_CRATER) / (1.0 - VOLCANO_CRATER)
        } else {
            0.0
        };

        TerrainGeneratorOutput {
            height,
            cave,
            cave_height,
            cave_river,
            soiled,
            beach,
            lava_chance,
        }
    }

    /// Strata parameters for a column.
    pub fn stone_column(&self, x: f64, y: f64) -> StoneColumn {
        StoneColumn {
            shift: self.stone.sample_2d(x, y) * 48.0,
            offset: (self.stone_offset.sample_2d(x, y) * 3.0).round() as i64,
        }
    }

    /// Stone type at a block position.
    pub fn stone_type(&self, x: f64, y: f64, z: i32) -> StoneType {
        self.stone_column(x, y).stone_type(z)
    }

    /// Whether a player may spawn on the column.
    pub fn is_valid_spawn(&self, x: f64, y: f64) -> bool {
        let layer = self.generate(x, y);
        !(layer.mountain_factor > 0.2
            || layer.volcano_factor > 0.4
            || layer.height <= WATER_LEVEL as f64)
    }
}
