//! Property tests for the climate clock and climate fields.

use proptest::prelude::*;
use scapes_core::{SeedStream, WorldSeed};
use scapes_world::climate::YEAR_DAYS;
use scapes_world::{ClimateClock, ClimateGenerator, TerrainGenerator};
use std::f64::consts::FRAC_PI_2;
use std::sync::{Arc, OnceLock};

fn climate() -> &'static ClimateGenerator {
    static CLIMATE: OnceLock<ClimateGenerator> = OnceLock::new();
    CLIMATE.get_or_init(|| {
        let mut seeds = SeedStream::new(WorldSeed(2024));
        let terrain = Arc::new(TerrainGenerator::new(&mut seeds));
        ClimateGenerator::new(&mut seeds, terrain)
    })
}

#[test]
fn weather_stays_in_unit_range_over_many_samples() {
    let mut climate = climate().clone();
    let mut samples = 0;
    for step in 0..100 {
        climate.sync(step * 3 - 50, step as f64 / 100.0);
        for i in 0..100 {
            let x = (i as f64 - 50.0) * 613.0 + step as f64;
            let y = (step as f64 - 50.0) * 977.0 - i as f64 * 41.0;
            let weather = climate.weather(x, y);
            assert!((0.0..=1.0).contains(&weather), "weather {weather} at ({x}, {y})");
            samples += 1;
        }
    }
    assert_eq!(samples, 10_000);
}

proptest! {
    #[test]
    fn clock_normalizes_with_carry(day in -1_000_000i64..1_000_000, time in -1000.0f64..1000.0) {
        let clock = ClimateClock::new(day, time);
        prop_assert!((0.0..1.0).contains(&clock.day_time()));
        let total = clock.day() as f64 + clock.day_time();
        prop_assert!((total - (day as f64 + time)).abs() < 1e-6);
    }

    #[test]
    fn clock_add_matches_construction(day in -10_000i64..10_000, a in 0.0f64..1.0, delta in -50.0f64..50.0) {
        let mut clock = ClimateClock::new(day, a);
        clock.add(delta);
        let direct = ClimateClock::new(day, a + delta);
        prop_assert_eq!(clock.day(), direct.day());
        prop_assert!((clock.day_time() - direct.day_time()).abs() < 1e-9);
    }

    #[test]
    fn season_repeats_every_year(day in -100_000i64..100_000, time in 0.0f64..1.0) {
        let now = ClimateClock::new(day, time);
        let next_year = ClimateClock::new(day + YEAR_DAYS, time);
        prop_assert!((0.0..1.0).contains(&now.season()));
        prop_assert!((now.season() - next_year.season()).abs() < 1e-9);
        prop_assert!((now.sun_declination() - next_year.sun_declination()).abs() < 1e-9);
    }

    #[test]
    fn sun_angles_are_bounded(day in -1000i64..1000, time in 0.0f64..1.0, y in -1.0e6f64..1.0e6) {
        let clock = ClimateClock::new(day, time);
        let elevation = clock.sun_elevation(y);
        prop_assert!((-FRAC_PI_2..=FRAC_PI_2).contains(&elevation));
        let azimuth = clock.sun_azimuth(y);
        prop_assert!(azimuth.is_finite());
    }

    #[test]
    fn climate_sample_is_finite(x in -1.0e6f64..1.0e6, y in -1.0e6f64..1.0e6) {
        let sample = climate().sample(x, y);
        prop_assert!(sample.temperature.is_finite());
        prop_assert!((0.0..=1.0).contains(&sample.humidity));
        prop_assert!((0.0..=1.0).contains(&sample.weather));
        prop_assert!((0.0..=15.0).contains(&sample.sun_light_reduction));
    }
}
