//! Biome classification.
//!
//! Biomes are derived from terrain features first (oceans, rivers, volcanoes,
//! mountains) and from the clock-independent climate fields otherwise, so a
//! column's biome never changes with the time of day or season.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunk::{blocks, BlockId};
use crate::climate::ClimateFields;
use crate::terrain::{TerrainGeneratorLayer, LAND_THRESHOLD, WATER_LEVEL};

/// `y` at which the world-creation spawn search runs.
pub const SPAWN_SEARCH_Y: i64 = -12_000;
/// Step between spawn candidates along `x`.
pub const SPAWN_SEARCH_STEP: i64 = 512;
/// Candidates tried before the search gives up.
pub const SPAWN_SEARCH_ATTEMPTS: u32 = 10_000;

/// Biome identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiomeId {
    // Cold
    Polar,
    Tundra,
    Taiga,

    // Temperate
    Plains,
    Forest,
    Swamp,

    // Warm
    Savanna,
    Desert,
    RainForest,

    // Terrain features
    Mountains,
    Volcano,
    River,
    Ocean,
    DeepOcean,
}

impl BiomeId {
    /// Get all biome IDs (for iteration).
    pub fn all() -> &'static [BiomeId] {
        &[
            BiomeId::Polar,
            BiomeId::Tundra,
            BiomeId::Taiga,
            BiomeId::Plains,
            BiomeId::Forest,
            BiomeId::Swamp,
            BiomeId::Savanna,
            BiomeId::Desert,
            BiomeId::RainForest,
            BiomeId::Mountains,
            BiomeId::Volcano,
            BiomeId::River,
            BiomeId::Ocean,
            BiomeId::DeepOcean,
        ]
    }

    /// Whether players may spawn in the biome.
    pub fn is_habitable(self) -> bool {
        matches!(
            self,
            BiomeId::Tundra
                | BiomeId::Taiga
                | BiomeId::Plains
                | BiomeId::Forest
                | BiomeId::Swamp
                | BiomeId::Savanna
                | BiomeId::RainForest
        )
    }

    pub fn is_water(self) -> bool {
        matches!(self, BiomeId::River | BiomeId::Ocean | BiomeId::DeepOcean)
    }

    /// Top block of soiled columns.
    pub fn surface_block(self) -> BlockId {
        match self {
            BiomeId::Desert => blocks::SAND,
            BiomeId::Polar | BiomeId::Volcano => blocks::STONE,
            BiomeId::River | BiomeId::Ocean | BiomeId::DeepOcean => blocks::GRAVEL,
            _ => blocks::GRASS,
        }
    }
}

/// Climate-only lookup table over (temperature °C, humidity).
///
/// Uses a 2D grid to map temperature and humidity to a BiomeId.
pub struct BiomeLookup {
    resolution: usize,
    /// Lookup table indexed as [temp_idx][humidity_idx]
    table: Vec<Vec<BiomeId>>,
}

impl BiomeLookup {
    /// Coldest temperature covered by the table.
    pub const MIN_TEMPERATURE: f64 = -20.0;
    /// Warmest temperature covered by the table.
    pub const MAX_TEMPERATURE: f64 = 40.0;

    pub fn new() -> Self {
        const RESOLUTION: usize = 32;
        let mut table = vec![vec![BiomeId::Plains; RESOLUTION]; RESOLUTION];
        let span = Self::MAX_TEMPERATURE - Self::MIN_TEMPERATURE;
        for (temp_idx, row) in table.iter_mut().enumerate() {
            let temp = Self::MIN_TEMPERATURE + temp_idx as f64 / (RESOLUTION - 1) as f64 * span;
            for (humidity_idx, cell) in row.iter_mut().enumerate() {
                let humidity = humidity_idx as f64 / (RESOLUTION - 1) as f64;
                *cell = Self::select_biome(temp, humidity);
            }
        }
        Self {
            resolution: RESOLUTION,
            table,
        }
    }

    fn select_biome(temperature: f64, humidity: f64) -> BiomeId {
        if temperature < -5.0 {
            BiomeId::Polar
        } else if temperature < 3.0 {
            BiomeId::Tundra
        } else if temperature < 10.0 {
            if humidity > 0.35 {
                BiomeId::Taiga
            } else {
                BiomeId::Tundra
            }
        } else if temperature < 22.0 {
            if humidity > 0.75 {
                BiomeId::Swamp
            } else if humidity > 0.45 {
                BiomeId::Forest
            } else {
                BiomeId::Plains
            }
        } else if humidity > 0.65 {
            BiomeId::RainForest
        } else if humidity > 0.3 {
            BiomeId::Savanna
        } else {
            BiomeId::Desert
        }
    }

    /// Look up a biome; inputs outside the table are clamped.
    pub fn lookup(&self, temperature: f64, humidity: f64) -> BiomeId {
        let span = Self::MAX_TEMPERATURE - Self::MIN_TEMPERATURE;
        let temp01 = ((temperature - Self::MIN_TEMPERATURE) / span).clamp(0.0, 1.0);
        let humidity01 = humidity.clamp(0.0, 1.0);
        let max = (self.resolution - 1) as f64;
        // NaN casts to index 0.
        let temp_idx = (temp01 * max) as usize;
        let humidity_idx = (humidity01 * max) as usize;
        self.table[temp_idx.min(self.resolution - 1)][humidity_idx.min(self.resolution - 1)]
    }
}

impl Default for BiomeLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Biome generator over world columns.
pub struct BiomeGenerator {
    fields: Arc<ClimateFields>,
    lookup: BiomeLookup,
}

impl BiomeGenerator {
    pub fn new(fields: Arc<ClimateFields>) -> Self {
        Self {
            fields,
            lookup: BiomeLookup::new(),
        }
    }

    /// Biome of the column at `(x, y)`.
    pub fn get(&self, x: f64, y: f64) -> BiomeId {
        let layer = self.fields.terrain().generate(x, y);
        self.get_with_layer(x, y, &layer)
    }

    /// Biome of a column whose terrain layer is already known.
    pub fn get_with_layer(&self, x: f64, y: f64, layer: &TerrainGeneratorLayer) -> BiomeId {
        let water = WATER_LEVEL as f64;
        if layer.terrain_factor < LAND_THRESHOLD && layer.height < water {
            return if layer.height < water - 64.0 {
                BiomeId::DeepOcean
            } else {
                BiomeId::Ocean
            };
        }
        if layer.river < 0.3 && layer.height < water {
            return BiomeId::River;
        }
        if layer.volcano_factor > 0.4 {
            return BiomeId::Volcano;
        }
        if layer.mountain_factor > 0.4 {
            return BiomeId::Mountains;
        }
        let humidity3 = self.fields.humidity3_d(x, y);
        let temperature = self.fields.temperature2_d(x, y, humidity3, layer);
        let humidity = self.fields.humidity2_d(humidity3, layer);
        self.lookup.lookup(temperature, humidity)
    }

    /// Whether the column is dry, gentle terrain in a habitable biome.
    pub fn is_valid_spawn(&self, x: f64, y: f64) -> bool {
        self.fields.terrain().is_valid_spawn(x, y) && self.get(x, y).is_habitable()
    }

    /// Scan `x` from `start_x` in steps of [`SPAWN_SEARCH_STEP`] at fixed `y`
    /// for the first valid spawn column.
    pub fn find_spawn(&self, start_x: i64, y: i64, max_attempts: u32) -> Option<(i64, i64)> {
        (0..max_attempts as i64)
            .map(|i| start_x.saturating_add(i.saturating_mul(SPAWN_SEARCH_STEP)))
            .find(|&x| self.is_valid_spawn(x as f64, y as f64))
            .map(|x| (x, y))
    }
}
