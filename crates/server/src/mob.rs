//! Living server-side mobs and their event hooks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;
use parking_lot::{Mutex, RwLock};
use scapes_core::EntityId;
use tracing::debug;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerSet<E> {
    next: u64,
    listeners: BTreeMap<u64, Listener<E>>,
}

/// Listeners of one event kind, called in subscription order.
pub struct Observers<E> {
    inner: Arc<Mutex<ListenerSet<E>>>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerSet {
                next: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }
}

impl<E: 'static> Observers<E> {
    /// Register a listener; it stays registered while the returned
    /// [`Subscription`] is alive.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut set = self.inner.lock();
            let id = set.next;
            set.next += 1;
            set.listeners.insert(id, Arc::new(listener));
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().listeners.remove(&id);
                }
            })),
        }
    }

    /// Call every listener. Listeners may subscribe or unsubscribe while
    /// running; such changes apply to the next emit.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self.inner.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unregisters its listener when dropped.
#[must_use = "dropping a subscription unregisters the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregister now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// A punch as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Punch {
    pub strength: f64,
    pub single_handed: bool,
}

/// Physical state of a mob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobState {
    pub position: DVec3,
    pub velocity: DVec3,
    pub health: f64,
    pub max_health: f64,
}

/// A living mob (player or creature) owned by a world.
pub struct MobLivingServer {
    id: EntityId,
    player: bool,
    state: RwLock<MobState>,
    dead: AtomicBool,
    on_jump: Observers<()>,
    on_punch: Observers<Punch>,
    on_spawn: Observers<()>,
    on_death: Observers<()>,
}

impl MobLivingServer {
    pub fn new(id: EntityId, player: bool, position: DVec3, max_health: f64) -> Arc<Self> {
        Arc::new(Self {
            id,
            player,
            state: RwLock::new(MobState {
                position,
                velocity: DVec3::ZERO,
                health: max_health,
                max_health,
            }),
            dead: AtomicBool::new(false),
            on_jump: Observers::default(),
            on_punch: Observers::default(),
            on_spawn: Observers::default(),
            on_death: Observers::default(),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn is_player(&self) -> bool {
        self.player
    }

    pub fn state(&self) -> MobState {
        *self.state.read()
    }

    pub fn position(&self) -> DVec3 {
        self.state.read().position
    }

    /// Speed in blocks per second.
    pub fn speed(&self) -> f64 {
        self.state.read().velocity.length()
    }

    pub fn health(&self) -> f64 {
        self.state.read().health
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Update position and velocity; non-finite vectors are ignored.
    pub fn set_motion(&self, position: DVec3, velocity: DVec3) {
        if !position.is_finite() || !velocity.is_finite() {
            return;
        }
        let mut state = self.state.write();
        state.position = position;
        state.velocity = velocity;
    }

    pub fn heal(&self, amount: f64) {
        if self.is_dead() || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        let mut state = self.state.write();
        state.health = (state.health + amount).min(state.max_health);
    }

    /// Apply damage; returns true if this killed the mob.
    pub fn damage(&self, amount: f64) -> bool {
        if self.is_dead() || !amount.is_finite() || amount <= 0.0 {
            return false;
        }
        let died = {
            let mut state = self.state.write();
            state.health -= amount;
            if state.health <= 0.0 {
                state.health = 0.0;
                true
            } else {
                false
            }
        };
        if died && !self.dead.swap(true, Ordering::AcqRel) {
            debug!(entity = %self.id, "mob died");
            self.on_death.emit(&());
            return true;
        }
        false
    }

    pub fn jump(&self) {
        if !self.is_dead() {
            self.on_jump.emit(&());
        }
    }

    pub fn punch(&self, punch: Punch) {
        if !self.is_dead() {
            self.on_punch.emit(&punch);
        }
    }

    /// Announce that the mob entered the world.
    pub fn spawn(&self) {
        self.on_spawn.emit(&());
    }

    /// Bring the mob back at `position` with full health.
    pub fn respawn(&self, position: DVec3) {
        {
            let mut state = self.state.write();
            state.position = position;
            state.velocity = DVec3::ZERO;
            state.health = state.max_health;
        }
        self.dead.store(false, Ordering::Release);
        debug!(entity = %self.id, "mob respawned");
        self.on_spawn.emit(&());
    }

    pub fn on_jump(&self, f: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.on_jump.subscribe(f)
    }

    pub fn on_punch(&self, f: impl Fn(&Punch) + Send + Sync + 'static) -> Subscription {
        self.on_punch.subscribe(f)
    }

    pub fn on_spawn(&self, f: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.on_spawn.subscribe(f)
    }

    pub fn on_death(&self, f: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.on_death.subscribe(f)
    }
}

/// Allocator of world-unique entity ids.
#[derive(Debug)]
pub struct EntityIds {
    next: AtomicU64,
}

impl EntityIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.max(1)),
        }
    }

    pub fn next_id(&self) -> EntityId {
        EntityId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure `id` is never handed out again.
    pub fn reserve(&self, id: EntityId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}
