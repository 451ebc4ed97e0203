//! Overworld environment: climate clock, day/time sync, seasonal block
//! simulation and weather events.

use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::Rng;
use scapes_net::{ServerMessage, TORNADO_ENTITY};
use scapes_world::chunk::blocks;
use scapes_world::{Chunk, ChunkStorage, ClimateGenerator, Voxel, CHUNK_HEIGHT, CHUNK_SIZE};
use tracing::{debug, instrument, warn};

use crate::mob::EntityIds;
use crate::outbox::Outbox;

/// Seconds of real time per in-game day by default.
pub const DEFAULT_DAY_LENGTH_SECONDS: f64 = 1200.0;

/// Work budget shared by every season pass: a chunk missing `delta`
/// simulation steps updates each column with probability `1 / (budget / delta)`.
pub const SEASON_WORK_BUDGET: i64 = 20_480;
/// Chunks simulated fewer than this many steps ago (plus jitter) are skipped.
pub const SEASON_MIN_DELTA: i64 = 360;
pub const SEASON_DELTA_JITTER: i64 = 80;

const SIMULATION_COUNT_LIMIT: i64 = i64::MAX - 10;
const MIN_PERIOD: f64 = 0.001;

fn sane_period(period: f64, fallback: f64) -> f64 {
    if period.is_finite() && period >= MIN_PERIOD {
        period
    } else {
        warn!(period, fallback, "invalid environment period");
        fallback
    }
}

/// Tunable environment constants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    /// Days advanced per second of simulated time.
    pub day_length_factor: f64,
    /// Seconds between day/time sync broadcasts.
    pub sync_period: f64,
    /// Seconds between simulation steps.
    pub tick_period: f64,
    /// Seconds between condition updates.
    pub condition_period: f64,
    /// Weather above which lightning may strike.
    pub lightning_weather: f64,
    /// Chance per chunk and step of a strike when stormy enough.
    pub lightning_chance: f64,
    /// Weather above which tornadoes may form.
    pub tornado_weather: f64,
    /// Chance per chunk and step of a tornado when stormy enough.
    pub tornado_chance: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::with_day_length(DEFAULT_DAY_LENGTH_SECONDS)
    }
}

impl EnvironmentConfig {
    /// Defaults with a custom day length in seconds.
    pub fn with_day_length(seconds: f64) -> Self {
        let seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            DEFAULT_DAY_LENGTH_SECONDS
        };
        Self {
            day_length_factor: 1.0 / seconds,
            sync_period: 4.0,
            tick_period: 0.05,
            condition_period: 4.0,
            lightning_weather: 0.7,
            lightning_chance: 0.0005,
            tornado_weather: 0.85,
            tornado_chance: 0.00002,
        }
    }
}

/// Season pass sampling divisor for a chunk `delta` steps behind.
pub fn season_update_count(delta: i64) -> i64 {
    (SEASON_WORK_BUDGET / delta.max(1)).max(1)
}

/// Run the season simulation of one chunk at global step `simulation_count`.
///
/// Returns whether a pass ran. A never-simulated chunk (stored count 0) or
/// one whose count is ahead of the global counter runs a full pass.
pub fn simulate_season<R: Rng + ?Sized>(
    climate: &ClimateGenerator,
    chunk: &mut Chunk,
    simulation_count: i64,
    rng: &mut R,
) -> bool {
    let stored = chunk.meta().simulation_count;
    let delta = simulation_count.saturating_sub(stored);
    let count = if stored == 0 || delta < 0 {
        1
    } else {
        let threshold = SEASON_MIN_DELTA + rng.gen_range(0..SEASON_DELTA_JITTER);
        if delta < threshold {
            return false;
        }
        season_update_count(delta)
    };

    let (origin_x, origin_y) = chunk.position().origin();
    for local_y in 0..CHUNK_SIZE {
        for local_x in 0..CHUNK_SIZE {
            if count > 1 && rng.gen_range(0..count) != 0 {
                continue;
            }
            let x = (origin_x + local_x as i32) as f64;
            let y = (origin_y + local_y as i32) as f64;
            update_column(climate, chunk, local_x, local_y, x, y);
        }
    }
    chunk.set_simulation_count(simulation_count);
    true
}

fn update_column(
    climate: &ClimateGenerator,
    chunk: &mut Chunk,
    local_x: usize,
    local_y: usize,
    x: f64,
    y: f64,
) {
    let Some(z) = chunk.highest_block_z(local_x, local_y) else {
        return;
    };
    let sample = climate.sample(x, y);
    let top = chunk.voxel(local_x, local_y, z);
    let freezing = sample.temperature < 0.0;
    let snowing = freezing && sample.weather > 0.5;

    let replacement = match top.id {
        blocks::GRASS if sample.humidity < 0.2 => Some(Voxel::new(blocks::DIRT)),
        blocks::DIRT if sample.humidity > 0.3 => Some(Voxel::new(blocks::GRASS)),
        blocks::SNOW if sample.temperature > 1.0 => Some(match top.data {
            0 => Voxel::AIR,
            depth => Voxel::with_data(blocks::SNOW, depth - 1),
        }),
        blocks::SNOW if snowing && top.data < blocks::MAX_SNOW_DEPTH => {
            Some(Voxel::with_data(blocks::SNOW, top.data + 1))
        }
        blocks::WATER if sample.temperature < -5.0 => Some(Voxel::new(blocks::ICE)),
        blocks::ICE if sample.temperature > 1.0 => Some(Voxel::new(blocks::WATER)),
        _ => None,
    };
    if let Some(voxel) = replacement {
        chunk.set_voxel(local_x, local_y, z, voxel);
        return;
    }

    if snowing && blocks::is_solid(top.id) && z + 1 < CHUNK_HEIGHT {
        chunk.set_voxel(local_x, local_y, z + 1, Voxel::new(blocks::SNOW));
    }
}

/// What one [`EnvironmentOverworldServer::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub syncs: u32,
    pub steps: u32,
    pub seasons: u32,
    pub lightning: u32,
    pub tornadoes: u32,
}

/// Drives the overworld climate clock and environment simulation.
pub struct EnvironmentOverworldServer {
    climate: Arc<RwLock<ClimateGenerator>>,
    config: EnvironmentConfig,
    outbox: Outbox,
    entity_ids: Arc<EntityIds>,
    rng: StdRng,
    sync_wait: f64,
    tick_wait: f64,
    simulation_count: i64,
}

impl EnvironmentOverworldServer {
    pub fn new(
        climate: Arc<RwLock<ClimateGenerator>>,
        config: EnvironmentConfig,
        outbox: Outbox,
        entity_ids: Arc<EntityIds>,
        rng: StdRng,
    ) -> Self {
        let defaults = EnvironmentConfig::default();
        let config = EnvironmentConfig {
            sync_period: sane_period(config.sync_period, defaults.sync_period),
            tick_period: sane_period(config.tick_period, defaults.tick_period),
            condition_period: sane_period(config.condition_period, defaults.condition_period),
            ..config
        };
        Self {
            climate,
            config,
            outbox,
            entity_ids,
            rng,
            sync_wait: 0.0,
            tick_wait: 0.0,
            simulation_count: 0,
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn simulation_count(&self) -> i64 {
        self.simulation_count
    }

    /// Restore a persisted counter; negative values restart at 0.
    pub fn set_simulation_count(&mut self, count: i64) {
        self.simulation_count = count.clamp(0, SIMULATION_COUNT_LIMIT);
    }

    /// Advance by `delta` seconds. Sync broadcasts and simulation steps that
    /// fell due during `delta` all run before returning.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub fn tick(&mut self, delta: f64, chunks: &mut ChunkStorage) -> TickReport {
        let mut report = TickReport::default();
        if !delta.is_finite() || delta < 0.0 {
            warn!(delta, "ignoring invalid environment delta");
            return report;
        }

        self.climate.write().add(delta * self.config.day_length_factor);

        self.sync_wait -= delta;
        while self.sync_wait <= 0.0 {
            self.sync_wait += self.config.sync_period;
            self.broadcast_time();
            report.syncs += 1;
        }

        self.tick_wait -= delta;
        while self.tick_wait <= 0.0 {
            self.tick_wait += self.config.tick_period;
            self.step(chunks, &mut report);
            report.steps += 1;
        }

        if report.lightning > 0 || report.tornadoes > 0 {
            debug!(?report, "weather events");
        }
        report
    }

    /// Send the current clock to everyone.
    pub fn broadcast_time(&self) {
        let climate = self.climate.read();
        self.outbox.broadcast(ServerMessage::DayTimeSync {
            day_time: climate.day_time() as f32,
            day: climate.day(),
        });
    }

    fn step(&mut self, chunks: &mut ChunkStorage, report: &mut TickReport) {
        self.simulation_count = if self.simulation_count >= SIMULATION_COUNT_LIMIT {
            1
        } else {
            self.simulation_count + 1
        };

        let climate = Arc::clone(&self.climate);
        let climate = climate.read();
        for chunk in chunks.iter_mut() {
            if simulate_season(&climate, chunk, self.simulation_count, &mut self.rng) {
                report.seasons += 1;
            }
            self.roll_weather(&climate, chunk, report);
        }
    }

    fn roll_weather(
        &mut self,
        climate: &ClimateGenerator,
        chunk: &Chunk,
        report: &mut TickReport,
    ) {
        let (origin_x, origin_y) = chunk.position().origin();
        let local_x = self.rng.gen_range(0..CHUNK_SIZE);
        let local_y = self.rng.gen_range(0..CHUNK_SIZE);
        let x = (origin_x + local_x as i32) as f64;
        let y = (origin_y + local_y as i32) as f64;
        let weather = climate.weather(x, y);

        let surface = chunk
            .highest_block_z(local_x, local_y)
            .map_or(0.0, |z| z as f64 + 1.0);
        let position = [x + 0.5, y + 0.5, surface];

        if weather > self.config.lightning_weather
            && self.rng.gen_bool(self.config.lightning_chance.clamp(0.0, 1.0))
        {
            self.outbox.broadcast(ServerMessage::Lightning { position });
            report.lightning += 1;
        }
        if weather > self.config.tornado_weather
            && self.rng.gen_bool(self.config.tornado_chance.clamp(0.0, 1.0))
        {
            let entity = self.entity_ids.next_id();
            debug!(%entity, x, y, "tornado formed");
            self.outbox.broadcast(ServerMessage::EntitySpawn {
                entity,
                kind: TORNADO_ENTITY.to_string(),
                position,
            });
            report.tornadoes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use scapes_core::{SeedStream, WorldSeed};
    use scapes_world::{ChunkPos, TerrainGenerator};

    fn climate() -> Arc<RwLock<ClimateGenerator>> {
        let mut seeds = SeedStream::new(WorldSeed(42));
        let terrain = Arc::new(TerrainGenerator::new(&mut seeds));
        Arc::new(RwLock::new(ClimateGenerator::new(&mut seeds, terrain)))
    }

    fn flat_chunk(pos: ChunkPos, top: u16) -> Chunk {
        let mut chunk = Chunk::new(pos);
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                chunk.set_voxel(x, y, 300, Voxel::new(top));
            }
        }
        chunk
    }

    fn server(config: EnvironmentConfig) -> (EnvironmentOverworldServer, crate::OutboxReceiver) {
        let (outbox, rx) = Outbox::channel();
        let server = EnvironmentOverworldServer::new(
            climate(),
            config,
            outbox,
            Arc::new(EntityIds::starting_at(1)),
            StdRng::seed_from_u64(7),
        );
        (server, rx)
    }

    #[test]
    fn update_count_is_non_increasing_in_delta() {
        assert_eq!(season_update_count(0), SEASON_WORK_BUDGET);
        assert_eq!(season_update_count(-5), SEASON_WORK_BUDGET);
        let mut previous = i64::MAX;
        for delta in 1..50_000 {
            let count = season_update_count(delta);
            assert!(count >= 1);
            assert!(count <= previous, "count grew at delta {delta}");
            previous = count;
        }
        assert_eq!(season_update_count(20_480), 1);
        assert_eq!(season_update_count(i64::MAX), 1);
    }

    #[test]
    fn never_simulated_chunk_always_runs() {
        let climate = climate();
        let climate = climate.read();
        let mut rng = StdRng::seed_from_u64(1);
        let mut chunk = flat_chunk(ChunkPos::new(0, 0), blocks::STONE);
        assert!(simulate_season(&climate, &mut chunk, 5, &mut rng));
        assert_eq!(chunk.meta().simulation_count, 5);
    }

    #[test]
    fn recent_chunks_are_skipped() {
        let climate = climate();
        let climate = climate.read();
        let mut rng = StdRng::seed_from_u64(2);
        let mut chunk = flat_chunk(ChunkPos::new(0, 0), blocks::STONE);
        chunk.set_simulation_count(1000);
        assert!(!simulate_season(&climate, &mut chunk, 1000 + 359, &mut rng));
        assert_eq!(chunk.meta().simulation_count, 1000);
        assert!(simulate_season(&climate, &mut chunk, 1000 + 440, &mut rng));
        assert_eq!(chunk.meta().simulation_count, 1440);
    }

    #[test]
    fn wrapped_counter_runs_full_pass() {
        let climate = climate();
        let climate = climate.read();
        let mut rng = StdRng::seed_from_u64(3);
        let mut chunk = flat_chunk(ChunkPos::new(0, 0), blocks::STONE);
        chunk.set_simulation_count(i64::MAX - 20);
        assert!(simulate_season(&climate, &mut chunk, 3, &mut rng));
        assert_eq!(chunk.meta().simulation_count, 3);
    }

    #[test]
    fn full_pass_touches_grass_according_to_humidity() {
        let climate = climate();
        let climate = climate.read();
        let mut rng = StdRng::seed_from_u64(4);
        let mut chunk = flat_chunk(ChunkPos::new(2, -3), blocks::GRASS);
        simulate_season(&climate, &mut chunk, 1, &mut rng);
        let (ox, oy) = chunk.position().origin();
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let humidity = climate.humidity((ox + x as i32) as f64, (oy + y as i32) as f64);
                let id = chunk.voxel(x, y, 300).id;
                if humidity < 0.2 {
                    assert_eq!(id, blocks::DIRT);
                } else {
                    assert_eq!(id, blocks::GRASS);
                }
            }
        }
    }

    #[test]
    fn sync_fires_on_schedule_under_variable_delta() {
        let config = EnvironmentConfig {
            sync_period: 4.0,
            tick_period: 1.0,
            ..EnvironmentConfig::default()
        };
        let (mut server, mut rx) = server(config);
        let mut storage = ChunkStorage::new(4);

        // Fires immediately, then every 4 s.
        assert_eq!(server.tick(0.5, &mut storage).syncs, 1);
        assert_eq!(server.tick(3.0, &mut storage).syncs, 0);
        assert_eq!(server.tick(0.5, &mut storage).syncs, 1);
        // A long stall catches up every missed sync.
        assert_eq!(server.tick(12.0, &mut storage).syncs, 3);

        let mut syncs = 0;
        while let Ok((_, msg)) = rx.try_recv() {
            assert!(matches!(msg, ServerMessage::DayTimeSync { .. }));
            syncs += 1;
        }
        assert_eq!(syncs, 5);
    }

    #[test]
    fn steps_catch_up_and_advance_counter() {
        let config = EnvironmentConfig {
            sync_period: 1000.0,
            tick_period: 0.25,
            ..EnvironmentConfig::default()
        };
        let (mut server, _rx) = server(config);
        let mut storage = ChunkStorage::new(4);
        storage.insert(flat_chunk(ChunkPos::new(0, 0), blocks::STONE));

        let report = server.tick(1.0, &mut storage);
        // Due at 0, 0.25, 0.5, 0.75 and 1.0.
        assert_eq!(report.steps, 5);
        assert_eq!(server.simulation_count(), 5);
        // Only the first step finds the chunk unsimulated.
        assert_eq!(report.seasons, 1);
        assert_eq!(storage.get(ChunkPos::new(0, 0)).unwrap().meta().simulation_count, 1);
    }

    #[test]
    fn clock_advances_by_day_length() {
        let (mut server, _rx) = server(EnvironmentConfig::with_day_length(100.0));
        let mut storage = ChunkStorage::new(1);
        server.tick(25.0, &mut storage);
        assert!((server.climate.read().day_time() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn invalid_delta_is_ignored() {
        let (mut server, mut rx) = server(EnvironmentConfig::default());
        let mut storage = ChunkStorage::new(1);
        assert_eq!(server.tick(f64::NAN, &mut storage), TickReport::default());
        assert_eq!(server.tick(-1.0, &mut storage), TickReport::default());
        assert!(rx.try_recv().is_err());
        assert_eq!(server.climate.read().day_time(), 0.0);
    }

    #[test]
    fn storms_strike_when_certain() {
        let config = EnvironmentConfig {
            lightning_weather: -1.0,
            lightning_chance: 1.0,
            tornado_weather: -1.0,
            tornado_chance: 1.0,
            sync_period: 1000.0,
            tick_period: 1.0,
            ..EnvironmentConfig::default()
        };
        let (mut server, mut rx) = server(config);
        let mut storage = ChunkStorage::new(4);
        storage.insert(flat_chunk(ChunkPos::new(0, 0), blocks::STONE));
        storage.insert(flat_chunk(ChunkPos::new(1, 0), blocks::STONE));

        let report = server.tick(0.5, &mut storage);
        assert_eq!(report.steps, 1);
        assert_eq!(report.lightning, 2);
        assert_eq!(report.tornadoes, 2);

        let mut strikes = 0;
        let mut spawns = 0;
        while let Ok((_, msg)) = rx.try_recv() {
            match msg {
                ServerMessage::Lightning { position } => {
                    assert!(position[2] >= 301.0);
                    strikes += 1;
                }
                ServerMessage::EntitySpawn { kind, .. } => {
                    assert_eq!(kind, TORNADO_ENTITY);
                    spawns += 1;
                }
                ServerMessage::DayTimeSync { .. } => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!((strikes, spawns), (2, 2));
    }
}
