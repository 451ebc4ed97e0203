//! Property tests for the condition state machine.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scapes_world::condition::{MAX_BODY_TEMPERATURE, MIN_BODY_TEMPERATURE};
use scapes_world::{ConditionInputs, ConditionState};

fn any_state() -> impl Strategy<Value = ConditionState> {
    (
        -5.0f64..5.0,
        -5.0f64..5.0,
        -5.0f64..5.0,
        -5.0f64..5.0,
        -100.0f64..200.0,
        any::<bool>(),
    )
        .prop_map(|(stamina, wake, hunger, thirst, body_temperature, sleeping)| {
            ConditionState {
                stamina,
                wake,
                hunger,
                thirst,
                body_temperature,
                sleeping,
            }
        })
}

fn any_inputs() -> impl Strategy<Value = ConditionInputs> {
    (-80.0f64..80.0, -50.0f64..50.0, 0.0f64..40.0, 1.0f64..40.0).prop_map(
        |(ambient_temperature, speed, health, max_health)| ConditionInputs {
            ambient_temperature,
            speed,
            health,
            max_health,
        },
    )
}

fn assert_in_range(state: &ConditionState) -> Result<(), TestCaseError> {
    for value in [state.stamina, state.wake, state.hunger, state.thirst] {
        prop_assert!((0.0..=1.0).contains(&value), "{state:?}");
    }
    prop_assert!(
        (MIN_BODY_TEMPERATURE..=MAX_BODY_TEMPERATURE).contains(&state.body_temperature),
        "{state:?}"
    );
    Ok(())
}

proptest! {
    #[test]
    fn tick_always_clamps(state in any_state(), inputs in any_inputs(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let step = state.tick(&inputs, &mut rng);
        assert_in_range(&step.state)?;
        prop_assert!(step.heal >= 0.0);
        prop_assert!(step.damage == 0.0 || step.damage == 5.0);
    }

    #[test]
    fn many_ticks_stay_in_range(inputs in any_inputs(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = ConditionState::default();
        for _ in 0..200 {
            state = state.tick(&inputs, &mut rng).state;
            assert_in_range(&state)?;
        }
    }

    #[test]
    fn actions_never_leave_range(state in any_state(), strength in -10.0f64..10.0, single in any::<bool>()) {
        assert_in_range(&state.after_jump())?;
        assert_in_range(&state.after_punch(strength, single))?;
    }
}

#[test]
fn idle_rested_entity_only_loses_base_stamina() {
    let mut rng = StdRng::seed_from_u64(0);
    let start = ConditionState::default();
    let inputs = ConditionInputs {
        ambient_temperature: 37.0,
        speed: 0.0,
        health: 20.0,
        max_health: 20.0,
    };
    let next = start.tick(&inputs, &mut rng).state;
    assert!((start.stamina - next.stamina - 0.00025).abs() < 1e-9);
    assert!((next.wake - start.wake).abs() < 1e-9);
    assert!((next.hunger - start.hunger).abs() < 1e-9);
    assert!((next.thirst - start.thirst).abs() < 1e-9);
    assert!((next.body_temperature - start.body_temperature).abs() < 1e-9);
    assert_eq!(next.sleeping, start.sleeping);
}
