//! Condition component of living mobs and the per-world updater task.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use scapes_core::EntityId;
use scapes_net::{ConditionPayload, ServerMessage};
use scapes_world::{ClimateGenerator, ConditionInputs, ConditionState, ConditionStep};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, trace};

use crate::mob::{MobLivingServer, Subscription};
use crate::outbox::{Outbox, Recipient};

/// Payload sent to the owning player.
pub fn condition_payload(state: &ConditionState) -> ConditionPayload {
    ConditionPayload {
        stamina: state.stamina,
        wake: state.wake,
        hunger: state.hunger,
        thirst: state.thirst,
        body_temperature: state.body_temperature,
        sleeping: state.sleeping,
    }
}

struct Attachment {
    entity: EntityId,
    _subscriptions: Vec<Subscription>,
}

/// Condition of one mob.
///
/// Readers get the latest immutable snapshot; writers replace it whole, so a
/// reader never observes a half-updated condition.
pub struct ConditionComponent {
    snapshot: RwLock<Arc<ConditionState>>,
    lifecycle: Mutex<Option<Attachment>>,
}

impl ConditionComponent {
    pub fn new(state: ConditionState) -> Arc<Self> {
        Arc::new(Self {
            snapshot: RwLock::new(Arc::new(state.clamped())),
            lifecycle: Mutex::new(None),
        })
    }

    /// Latest published condition.
    pub fn snapshot(&self) -> Arc<ConditionState> {
        self.snapshot.read().clone()
    }

    /// Replace the condition with `f(current)`, returning the new snapshot.
    pub fn update(&self, f: impl FnOnce(&ConditionState) -> ConditionState) -> Arc<ConditionState> {
        let mut slot = self.snapshot.write();
        let next = Arc::new(f(&slot).clamped());
        *slot = next.clone();
        next
    }

    /// Run one simulation tick and publish its state.
    pub fn apply_tick(&self, f: impl FnOnce(&ConditionState) -> ConditionStep) -> ConditionStep {
        let mut slot = self.snapshot.write();
        let step = f(&slot);
        *slot = Arc::new(step.state);
        step
    }

    pub fn is_attached(&self) -> bool {
        self.lifecycle.lock().is_some()
    }

    /// Hook the component to `mob` and register it with `updater`.
    ///
    /// Returns false if already attached.
    pub fn init(self: &Arc<Self>, mob: &Arc<MobLivingServer>, updater: &ConditionUpdater) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_some() {
            return false;
        }

        let on_jump = {
            let component = Arc::downgrade(self);
            mob.on_jump(move |_| {
                if let Some(component) = component.upgrade() {
                    component.update(ConditionState::after_jump);
                }
            })
        };
        let on_punch = {
            let component = Arc::downgrade(self);
            mob.on_punch(move |punch| {
                if let Some(component) = component.upgrade() {
                    component.update(|state| state.after_punch(punch.strength, punch.single_handed));
                }
            })
        };
        let on_spawn = {
            let component = Arc::downgrade(self);
            mob.on_spawn(move |_| {
                if let Some(component) = component.upgrade() {
                    component.update(|_| ConditionState::default());
                }
            })
        };
        updater.register(mob, self);

        *lifecycle = Some(Attachment {
            entity: mob.id(),
            _subscriptions: vec![on_jump, on_punch, on_spawn],
        });
        debug!(entity = %mob.id(), "condition attached");
        true
    }

    /// Unhook from the mob and the updater. Returns false if not attached.
    pub fn dispose(&self, updater: &ConditionUpdater) -> bool {
        let Some(attachment) = self.lifecycle.lock().take() else {
            return false;
        };
        updater.unregister(attachment.entity);
        debug!(entity = %attachment.entity, "condition detached");
        true
    }
}

struct Registration {
    mob: Weak<MobLivingServer>,
    component: Weak<ConditionComponent>,
}

/// Ticks every registered condition of one world.
pub struct ConditionUpdater {
    entries: Mutex<BTreeMap<EntityId, Registration>>,
    climate: Arc<RwLock<ClimateGenerator>>,
    outbox: Outbox,
    rng: Mutex<StdRng>,
}

impl ConditionUpdater {
    pub fn new(climate: Arc<RwLock<ClimateGenerator>>, outbox: Outbox, rng: StdRng) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            climate,
            outbox,
            rng: Mutex::new(rng),
        }
    }

    fn register(&self, mob: &Arc<MobLivingServer>, component: &Arc<ConditionComponent>) {
        self.entries.lock().insert(
            mob.id(),
            Registration {
                mob: Arc::downgrade(mob),
                component: Arc::downgrade(component),
            },
        );
    }

    fn unregister(&self, entity: EntityId) {
        self.entries.lock().remove(&entity);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Update every live registration once; returns how many were updated.
    ///
    /// Registrations whose mob or component is gone are dropped.
    #[instrument(skip(self))]
    pub fn tick(&self) -> usize {
        let live: Vec<(Arc<MobLivingServer>, Arc<ConditionComponent>)> = {
            let mut entries = self.entries.lock();
            entries.retain(|_, r| r.mob.strong_count() > 0 && r.component.strong_count() > 0);
            entries
                .values()
                .filter_map(|r| Some((r.mob.upgrade()?, r.component.upgrade()?)))
                .collect()
        };

        let mut updated = 0;
        for (mob, component) in live {
            if mob.is_dead() {
                continue;
            }
            let state = mob.state();
            let ambient = self
                .climate
                .read()
                .temperature(state.position.x, state.position.y);
            let inputs = ConditionInputs {
                ambient_temperature: ambient,
                speed: state.velocity.length(),
                health: state.health,
                max_health: state.max_health,
            };
            let step = component.apply_tick(|current| {
                let mut rng = self.rng.lock();
                current.tick(&inputs, &mut *rng)
            });

            mob.heal(step.heal);
            if step.damage > 0.0 {
                mob.damage(step.damage);
            }
            if mob.is_player() {
                self.outbox.send(
                    Recipient::Player(mob.id()),
                    ServerMessage::condition(mob.id(), condition_payload(&step.state)),
                );
            }
            trace!(entity = %mob.id(), stamina = step.state.stamina, "condition ticked");
            updated += 1;
        }
        updated
    }

    /// Run [`ConditionUpdater::tick`] every `period` until the task is aborted.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick();
            }
        })
    }
}
