//! Authoritative overworld host: environment simulation, mobs and their
//! condition, client sessions and world lifecycle.

pub mod condition;
pub mod environment;
pub mod mob;
pub mod outbox;
pub mod session;
pub mod world;

pub use condition::{ConditionComponent, ConditionUpdater};
pub use environment::{
    season_update_count, simulate_season, EnvironmentConfig, EnvironmentOverworldServer,
    TickReport,
};
pub use mob::{EntityIds, MobLivingServer, MobState, Observers, Punch, Subscription};
pub use outbox::{Outbox, OutboxReceiver, Recipient};
pub use session::{Session, SessionState};
pub use world::{WorldConfig, WorldServer, PLAYER_MAX_HEALTH};
