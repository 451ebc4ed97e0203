//! Living-creature condition: stamina, wake, hunger, thirst, body
//! temperature and sleep.
//!
//! [`ConditionState::tick`] is a pure step over one updater period (4 s of
//! simulated time); randomness is injected by the caller. All normalized
//! fields end every step in `[0, 1]`, body temperature in
//! `[MIN_BODY_TEMPERATURE, MAX_BODY_TEMPERATURE]`.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const NORMAL_BODY_TEMPERATURE: f64 = 37.0;
pub const MIN_BODY_TEMPERATURE: f64 = 10.0;
pub const MAX_BODY_TEMPERATURE: f64 = 50.0;

/// Damage dealt each tick while stamina is exhausted.
pub const EXHAUSTION_DAMAGE: f64 = 5.0;
pub const JUMP_STAMINA: f64 = 0.15;
pub const PUNCH_STAMINA: f64 = 0.04;
pub const SINGLE_HANDED_FACTOR: f64 = 1.7;

const BASE_DRAIN: f64 = 0.00025;
const MOVEMENT_DRAIN: f64 = 0.0005;
const MAX_SPEED_SQUARED: f64 = 16.0;
const HEAL_STAMINA: f64 = 0.002;
const REGEN_RATE: f64 = 0.05;
const SLEEP_WAKE_RESTORE: f64 = 0.004;
const TEMPERATURE_DRIFT: f64 = 2000.0;
const MAX_TEMPERATURE_CORRECTION: f64 = 0.5;
const CORRECTION_COST: f64 = 0.02;

/// Persisted and synchronized condition values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionState {
    pub stamina: f64,
    pub wake: f64,
    pub hunger: f64,
    pub thirst: f64,
    pub body_temperature: f64,
    pub sleeping: bool,
}

impl Default for ConditionState {
    /// Fully rested, fed and at normal temperature.
    fn default() -> Self {
        Self {
            stamina: 1.0,
            wake: 1.0,
            hunger: 1.0,
            thirst: 1.0,
            body_temperature: NORMAL_BODY_TEMPERATURE,
            sleeping: false,
        }
    }
}

/// Environment of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionInputs {
    /// Climate temperature at the entity, °C.
    pub ambient_temperature: f64,
    /// Movement speed, blocks per second.
    pub speed: f64,
    pub health: f64,
    pub max_health: f64,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionStep {
    pub state: ConditionState,
    /// Health to restore.
    pub heal: f64,
    /// Exhaustion damage to apply.
    pub damage: f64,
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl ConditionState {
    /// Replace non-finite values with defaults and clamp to valid ranges.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            stamina: finite_or(self.stamina, defaults.stamina).clamp(0.0, 1.0),
            wake: finite_or(self.wake, defaults.wake).clamp(0.0, 1.0),
            hunger: finite_or(self.hunger, defaults.hunger).clamp(0.0, 1.0),
            thirst: finite_or(self.thirst, defaults.thirst).clamp(0.0, 1.0),
            body_temperature: finite_or(self.body_temperature, defaults.body_temperature)
                .clamp(MIN_BODY_TEMPERATURE, MAX_BODY_TEMPERATURE),
            sleeping: self.sleeping,
        }
    }

    /// Advance the condition by one updater period.
    pub fn tick<R: Rng + ?Sized>(&self, inputs: &ConditionInputs, rng: &mut R) -> ConditionStep {
        let start = Self {
            stamina: finite_or(self.stamina, 1.0),
            wake: finite_or(self.wake, 1.0),
            hunger: finite_or(self.hunger, 1.0),
            thirst: finite_or(self.thirst, 1.0),
            body_temperature: finite_or(self.body_temperature, NORMAL_BODY_TEMPERATURE),
            sleeping: self.sleeping,
        };
        let (regen_factor, deplete_factor) = if start.sleeping {
            (1.5, 0.05)
        } else {
            (1.0, 1.0)
        };
        let mut next = start;
        let mut heal = 0.0;

        if start.stamina > 0.2 && inputs.health < inputs.max_health {
            heal = start.stamina * 0.5;
            next.stamina -= HEAL_STAMINA;
        } else {
            let speed = finite_or(inputs.speed, 0.0);
            let drain = MOVEMENT_DRAIN * (speed * speed).min(MAX_SPEED_SQUARED) * deplete_factor;
            next.stamina -= drain;
            next.wake -= drain * 0.5;
        }

        let rate = regen_factor * start.hunger * start.thirst * REGEN_RATE * (1.0 - start.stamina);
        next.stamina += rate;
        next.hunger -= rate * 0.1;
        next.thirst -= rate * 0.2;

        next.stamina -= deplete_factor * BASE_DRAIN;
        if start.sleeping {
            next.wake += SLEEP_WAKE_RESTORE;
        }

        let ambient = finite_or(inputs.ambient_temperature, next.body_temperature);
        next.body_temperature += (ambient - next.body_temperature) / TEMPERATURE_DRIFT;
        if next.body_temperature < NORMAL_BODY_TEMPERATURE {
            let correction =
                (NORMAL_BODY_TEMPERATURE - next.body_temperature).min(MAX_TEMPERATURE_CORRECTION);
            next.body_temperature += correction;
            next.stamina -= correction * CORRECTION_COST;
        } else if next.body_temperature > NORMAL_BODY_TEMPERATURE {
            let correction =
                (next.body_temperature - NORMAL_BODY_TEMPERATURE).min(MAX_TEMPERATURE_CORRECTION);
            next.body_temperature -= correction;
            next.thirst -= correction * CORRECTION_COST;
        }

        let roll: f64 = rng.gen_range(0.0..10.0);
        next.sleeping = if start.sleeping {
            roll >= next.wake * 10.0
        } else {
            roll < 7.0 - next.wake * 7.0
        };

        let damage = if next.stamina <= 0.0 {
            EXHAUSTION_DAMAGE
        } else {
            0.0
        };

        ConditionStep {
            state: next.clamped(),
            heal,
            damage,
        }
    }

    /// Stamina after a jump.
    pub fn after_jump(&self) -> Self {
        Self {
            stamina: self.stamina - JUMP_STAMINA,
            ..*self
        }
        .clamped()
    }

    /// Stamina after a punch of the given strength.
    pub fn after_punch(&self, strength: f64, single_handed: bool) -> Self {
        let mut cost = PUNCH_STAMINA * finite_or(strength, 0.0).max(0.0);
        if single_handed {
            cost *= SINGLE_HANDED_FACTOR;
        }
        Self {
            stamina: self.stamina - cost,
            ..*self
        }
        .clamped()
    }
}
