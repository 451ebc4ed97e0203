//! One running overworld: generators, resident chunks, environment,
//! condition updater and connected players.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use glam::DVec3;
use parking_lot::{Mutex, RwLock};
use scapes_core::{scoped_rng, EntityId, WorldSeed};
use scapes_net::ServerMessage;
use scapes_world::biome::{SPAWN_SEARCH_ATTEMPTS, SPAWN_SEARCH_Y};
use scapes_world::{
    vanilla_content, ChunkPos, ChunkStorage, ClimateGenerator, EnvironmentRecord,
    OverworldGenerators, PlayerRecord, WorldMetadata, WorldStore, CHUNK_HEIGHT, WATER_LEVEL,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::condition::{ConditionComponent, ConditionUpdater};
use crate::environment::{EnvironmentConfig, EnvironmentOverworldServer, TickReport};
use crate::mob::{EntityIds, MobLivingServer, Subscription};
use crate::outbox::Outbox;

/// Health of a freshly joined player.
pub const PLAYER_MAX_HEALTH: f64 = 20.0;

const ENVIRONMENT_RNG_DOMAIN: u64 = 0x656e_7669_726f_6e6d;
const CONDITION_RNG_DOMAIN: u64 = 0x636f_6e64_6974_696f;
/// Ids below this are reserved for player accounts.
const FIRST_SPAWNED_ENTITY: u64 = 1 << 32;

/// Settings of one world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub name: String,
    /// Seed used when the world is created; an existing world keeps its own.
    pub seed: WorldSeed,
    /// World directory holding `world.json`, `environment.json`, players and regions.
    pub save_root: PathBuf,
    pub environment: EnvironmentConfig,
    /// Chunks loaded around the spawn point on open.
    pub load_radius: i32,
    /// Resident chunk capacity.
    pub chunk_cache: usize,
}

struct ChunkManager {
    storage: ChunkStorage,
    store: Arc<WorldStore>,
    generators: OverworldGenerators,
}

impl ChunkManager {
    /// Make `pos` resident, loading it from disk or generating it.
    fn ensure(&mut self, pos: ChunkPos) -> Result<()> {
        if self.storage.contains(pos) {
            return Ok(());
        }
        let chunk = match self.store.regions().load_chunk(pos)? {
            Some(chunk) if chunk.is_populated() => chunk,
            Some(mut chunk) => {
                self.generators.populator.populate(&mut chunk);
                chunk
            }
            None => self.generators.build_chunk(pos),
        };
        let evicted = self.storage.insert(chunk);
        let dirty: Vec<_> = evicted.iter().filter(|c| c.is_dirty()).collect();
        if !dirty.is_empty() {
            debug!(count = dirty.len(), "writing back evicted chunks");
            self.store.regions().save_chunks(dirty)?;
        }
        Ok(())
    }

    /// Write every dirty resident chunk; returns how many were written.
    fn save_dirty(&mut self) -> Result<usize> {
        let count = self.storage.dirty().count();
        if count == 0 {
            return Ok(0);
        }
        self.store.regions().save_chunks(self.storage.dirty())?;
        self.storage.clear_dirty();
        Ok(count)
    }
}

struct PlayerHandle {
    mob: Arc<MobLivingServer>,
    condition: Arc<ConditionComponent>,
    _death: Subscription,
}

impl PlayerHandle {
    fn record(&self) -> PlayerRecord {
        PlayerRecord {
            condition: *self.condition.snapshot(),
            position: Some(self.mob.position().to_array()),
        }
    }
}

/// A loaded overworld.
pub struct WorldServer {
    name: String,
    seed: WorldSeed,
    store: Arc<WorldStore>,
    generators: OverworldGenerators,
    climate: Arc<RwLock<ClimateGenerator>>,
    chunks: Mutex<ChunkManager>,
    environment: Mutex<EnvironmentOverworldServer>,
    updater: Arc<ConditionUpdater>,
    outbox: Outbox,
    players: Mutex<BTreeMap<EntityId, PlayerHandle>>,
    spawn: [i64; 3],
    load_radius: i32,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WorldServer {
    /// Open the world at `config.save_root`, creating it if needed.
    #[instrument(skip(config, outbox), fields(world = %config.name))]
    pub fn open(config: WorldConfig, outbox: Outbox) -> Result<Self> {
        let store = Arc::new(
            WorldStore::open(&config.save_root)
                .with_context(|| format!("open world {}", config.name))?,
        );
        let metadata = match store.load_metadata()? {
            Some(metadata) => {
                if metadata.seed != config.seed {
                    info!(
                        stored = metadata.seed.0,
                        requested = config.seed.0,
                        "using stored world seed"
                    );
                }
                metadata
            }
            None => WorldMetadata {
                name: config.name.clone(),
                seed: config.seed,
                spawn: None,
            },
        };
        let seed = metadata.seed;
        let generators = OverworldGenerators::new(seed, vanilla_content());

        let spawn = match metadata.spawn {
            Some(spawn) => spawn,
            None => {
                let spawn = find_spawn(&generators);
                store.save_metadata(&WorldMetadata {
                    spawn: Some(spawn),
                    ..metadata.clone()
                })?;
                info!(x = spawn[0], y = spawn[1], z = spawn[2], "spawn chosen");
                spawn
            }
        };

        let record = store.load_environment()?.unwrap_or_default();
        let mut climate = ClimateGenerator::with_fields(generators.climate.clone());
        climate.sync(record.day, record.day_time);
        let climate = Arc::new(RwLock::new(climate));

        let entity_ids = Arc::new(EntityIds::starting_at(FIRST_SPAWNED_ENTITY));
        let mut environment = EnvironmentOverworldServer::new(
            climate.clone(),
            config.environment.clone(),
            outbox.clone(),
            entity_ids,
            scoped_rng(seed, ENVIRONMENT_RNG_DOMAIN),
        );
        environment.set_simulation_count(record.simulation_count);

        let updater = Arc::new(ConditionUpdater::new(
            climate.clone(),
            outbox.clone(),
            scoped_rng(seed, CONDITION_RNG_DOMAIN),
        ));

        let world = Self {
            name: metadata.name,
            seed,
            store: store.clone(),
            generators: generators.clone(),
            climate,
            chunks: Mutex::new(ChunkManager {
                storage: ChunkStorage::new(config.chunk_cache),
                store,
                generators,
            }),
            environment: Mutex::new(environment),
            updater,
            outbox,
            players: Mutex::new(BTreeMap::new()),
            spawn,
            load_radius: config.load_radius.max(0),
            tasks: Mutex::new(Vec::new()),
        };
        world.preload()?;
        info!(seed = seed.0, day = record.day, "world opened");
        Ok(world)
    }

    fn preload(&self) -> Result<()> {
        let center = ChunkPos::containing(self.spawn[0] as i32, self.spawn[1] as i32);
        let radius = self.load_radius;
        let mut chunks = self.chunks.lock();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                chunks.ensure(ChunkPos::new(center.x + dx, center.y + dy))?;
            }
        }
        debug!(resident = chunks.storage.len(), "spawn area loaded");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn spawn(&self) -> [i64; 3] {
        self.spawn
    }

    pub fn generators(&self) -> &OverworldGenerators {
        &self.generators
    }

    pub fn climate(&self) -> &Arc<RwLock<ClimateGenerator>> {
        &self.climate
    }

    pub fn updater(&self) -> &Arc<ConditionUpdater> {
        &self.updater
    }

    pub fn resident_chunks(&self) -> usize {
        self.chunks.lock().storage.len()
    }

    pub fn simulation_count(&self) -> i64 {
        self.environment.lock().simulation_count()
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().len()
    }

    /// Current clock as a sync packet.
    pub fn day_time_sync(&self) -> ServerMessage {
        let climate = self.climate.read();
        ServerMessage::DayTimeSync {
            day_time: climate.day_time() as f32,
            day: climate.day(),
        }
    }

    /// Make the chunk holding world column `(x, y)` resident.
    pub fn load_chunk_at(&self, x: i32, y: i32) -> Result<()> {
        self.chunks.lock().ensure(ChunkPos::containing(x, y))
    }

    /// Advance the environment by `delta` seconds over the resident chunks.
    pub fn tick_environment(&self, delta: f64) -> TickReport {
        let mut chunks = self.chunks.lock();
        self.environment.lock().tick(delta, &mut chunks.storage)
    }

    /// Add a player mob for `id`, restoring its saved condition and position.
    pub fn join_player(&self, id: EntityId) -> Result<Arc<MobLivingServer>> {
        if self.players.lock().contains_key(&id) {
            bail!("player {id} already joined");
        }
        let saved = self.store.load_player(id)?;
        let fresh = saved.is_none();
        let record = saved.unwrap_or_default();
        let position = record
            .position
            .map(DVec3::from_array)
            .filter(|p| p.is_finite())
            .unwrap_or_else(|| self.spawn_position());
        self.load_chunk_at(position.x.floor() as i32, position.y.floor() as i32)?;

        let mob = MobLivingServer::new(id, true, position, PLAYER_MAX_HEALTH);
        let condition = ConditionComponent::new(record.condition);
        condition.init(&mob, &self.updater);
        // A restored record keeps its condition; only new players spawn.
        if fresh {
            mob.spawn();
        }
        let death = mob.on_death(move |_| info!(player = %id, "player died"));

        self.players.lock().insert(
            id,
            PlayerHandle {
                mob: mob.clone(),
                condition,
                _death: death,
            },
        );
        info!(player = %id, x = position.x, y = position.y, z = position.z, "player joined");
        Ok(mob)
    }

    /// Bring a dead player back at the world spawn with full health and a
    /// reset condition. Returns false for unknown or living players.
    pub fn respawn_player(&self, id: EntityId) -> Result<bool> {
        let Some(mob) = self.players.lock().get(&id).map(|h| h.mob.clone()) else {
            return Ok(false);
        };
        if !mob.is_dead() {
            return Ok(false);
        }
        let position = self.spawn_position();
        self.load_chunk_at(position.x.floor() as i32, position.y.floor() as i32)?;
        mob.respawn(position);
        info!(player = %id, "player respawned");
        Ok(true)
    }

    fn spawn_position(&self) -> DVec3 {
        DVec3::new(
            self.spawn[0] as f64 + 0.5,
            self.spawn[1] as f64 + 0.5,
            self.spawn[2] as f64,
        )
    }

    /// Remove a player and persist its record. Unknown ids are ignored.
    pub fn leave_player(&self, id: EntityId) -> Result<()> {
        let Some(handle) = self.players.lock().remove(&id) else {
            return Ok(());
        };
        handle.condition.dispose(&self.updater);
        self.store.save_player(id, &handle.record())?;
        info!(player = %id, "player left");
        Ok(())
    }

    /// Persist dirty chunks, the environment and every connected player.
    #[instrument(skip(self), fields(world = %self.name))]
    pub fn save(&self) -> Result<()> {
        let written = self.chunks.lock().save_dirty()?;
        // Lock order is chunks, environment, climate; never hold climate
        // while waiting on the environment.
        let simulation_count = self.simulation_count();
        let record = {
            let climate = self.climate.read();
            EnvironmentRecord {
                day_time: climate.day_time(),
                day: climate.day(),
                simulation_count,
            }
        };
        self.store.save_environment(&record)?;

        let players: Vec<(EntityId, PlayerRecord)> = self
            .players
            .lock()
            .iter()
            .map(|(id, handle)| (*id, handle.record()))
            .collect();
        for (id, record) in &players {
            self.store.save_player(*id, record)?;
        }
        debug!(chunks = written, players = players.len(), "world saved");
        Ok(())
    }

    /// Start the environment and condition tasks on the current tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        let (tick_period, condition_period) = {
            let environment = self.environment.lock();
            let config = environment.config();
            (config.tick_period, config.condition_period)
        };
        tasks.push(spawn_environment(
            Arc::downgrade(self),
            Duration::from_secs_f64(tick_period),
        ));
        tasks.push(
            self.updater
                .clone()
                .spawn(Duration::from_secs_f64(condition_period)),
        );
        info!(world = %self.name, "world tasks started");
    }

    /// Stop the tasks, detach every player and save.
    pub fn shutdown(&self) -> Result<()> {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        let ids: Vec<EntityId> = self.players.lock().keys().copied().collect();
        for id in ids {
            if let Err(err) = self.leave_player(id) {
                warn!(player = %id, error = %err, "failed to save player");
            }
        }
        self.save()?;
        info!(world = %self.name, "world unloaded");
        Ok(())
    }

    /// Queue a packet for every connected player.
    pub fn broadcast(&self, msg: ServerMessage) {
        self.outbox.broadcast(msg);
    }
}

fn spawn_environment(world: Weak<WorldServer>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        loop {
            interval.tick().await;
            let Some(world) = world.upgrade() else {
                break;
            };
            let now = Instant::now();
            world.tick_environment(now.duration_since(last).as_secs_f64());
            last = now;
        }
    })
}

/// Spawn column from the biome search, falling back to the search origin.
fn find_spawn(generators: &OverworldGenerators) -> [i64; 3] {
    let (x, y) = generators
        .biomes
        .find_spawn(0, SPAWN_SEARCH_Y, SPAWN_SEARCH_ATTEMPTS)
        .unwrap_or_else(|| {
            warn!("no valid spawn found; using search origin");
            (0, SPAWN_SEARCH_Y)
        });
    let height = generators.terrain.generate(x as f64, y as f64).height;
    let surface = height.max(WATER_LEVEL as f64).floor() as i64;
    [x, y, (surface + 1).min(CHUNK_HEIGHT as i64 - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scapes_world::ConditionState;

    fn config(root: &std::path::Path) -> WorldConfig {
        WorldConfig {
            name: "test".into(),
            seed: WorldSeed(42),
            save_root: root.to_path_buf(),
            environment: EnvironmentConfig::default(),
            load_radius: 0,
            chunk_cache: 4,
        }
    }

    #[test]
    fn spawn_is_on_the_surface() {
        let generators = OverworldGenerators::new(WorldSeed(42), vanilla_content());
        let [x, y, z] = find_spawn(&generators);
        assert_eq!(y, SPAWN_SEARCH_Y);
        assert!(z > WATER_LEVEL as i64);
        assert_eq!(find_spawn(&generators), [x, y, z]);
    }

    #[test]
    fn join_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, _rx) = Outbox::channel();
        let world = WorldServer::open(config(dir.path()), outbox).unwrap();
        world.join_player(EntityId(7)).unwrap();
        assert!(world.join_player(EntityId(7)).is_err());
        assert_eq!(world.player_count(), 1);
        assert_eq!(world.updater().len(), 1);
    }

    #[test]
    fn leaving_saves_the_player() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, _rx) = Outbox::channel();
        let world = WorldServer::open(config(dir.path()), outbox).unwrap();
        let mob = world.join_player(EntityId(7)).unwrap();
        mob.jump();
        world.leave_player(EntityId(7)).unwrap();
        assert!(world.updater().is_empty());

        let store = WorldStore::open(dir.path()).unwrap();
        let record = store.load_player(EntityId(7)).unwrap().unwrap();
        assert!(record.condition.stamina < ConditionState::default().stamina);
        assert_eq!(record.position, Some(mob.position().to_array()));
    }

    #[test]
    fn save_runs_alongside_environment_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, _rx) = Outbox::channel();
        let world = Arc::new(WorldServer::open(config(dir.path()), outbox).unwrap());
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handles: Vec<_> = (0..2)
            .map(|worker| {
                let world = Arc::clone(&world);
                let done_tx = done_tx.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if worker == 0 {
                            world.tick_environment(0.0);
                        } else {
                            world.save().unwrap();
                        }
                    }
                    done_tx.send(worker).unwrap();
                })
            })
            .collect();

        for _ in 0..2 {
            done_rx
                .recv_timeout(std::time::Duration::from_secs(30))
                .expect("save and tick should not block each other");
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn rejoin_keeps_condition_and_respawn_resets_it() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, _rx) = Outbox::channel();
        let world = WorldServer::open(config(dir.path()), outbox).unwrap();
        let mob = world.join_player(EntityId(7)).unwrap();
        mob.jump();
        world.leave_player(EntityId(7)).unwrap();

        let mob = world.join_player(EntityId(7)).unwrap();
        let tired = world.players.lock()[&EntityId(7)].condition.snapshot();
        assert!(tired.stamina < ConditionState::default().stamina);

        assert!(!world.respawn_player(EntityId(7)).unwrap());
        mob.damage(PLAYER_MAX_HEALTH);
        assert!(world.respawn_player(EntityId(7)).unwrap());
        assert!(!mob.is_dead());
        assert_eq!(mob.health(), PLAYER_MAX_HEALTH);
        assert_eq!(mob.position(), world.spawn_position());
        let condition = world.players.lock()[&EntityId(7)].condition.snapshot();
        assert_eq!(*condition, ConditionState::default());
        assert!(!world.respawn_player(EntityId(99)).unwrap());
    }

    #[test]
    fn cache_eviction_writes_chunks_back() {
        let dir = tempfile::tempdir().unwrap();
        let (outbox, _rx) = Outbox::channel();
        let world = WorldServer::open(config(dir.path()), outbox).unwrap();
        for x in 0..6 {
            world.load_chunk_at(x * 16, 0).unwrap();
        }
        assert_eq!(world.resident_chunks(), 4);
        let store = WorldStore::open(dir.path()).unwrap();
        assert!(store.regions().chunk_exists(ChunkPos::new(0, 0)).unwrap());
    }
}
