//! Climate: the day/season clock, sun position and the temperature,
//! humidity and weather fields.
//!
//! Position-only fields live in [`ClimateFields`], which is immutable and
//! shared between the environment, biome classification and decoration.
//! [`ClimateGenerator`] pairs those fields with a [`ClimateClock`]; only the
//! clock is mutable state.
//!
//! Every function here is total over finite inputs and never yields NaN.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use noise::OpenSimplex;
use scapes_core::SeedStream;
use tracing::warn;

use crate::noise::{simplex_2d, simplex_3d};
use crate::terrain::{TerrainGenerator, TerrainGeneratorLayer, LAND_THRESHOLD, WATER_LEVEL};

/// Days per year.
pub const YEAR_DAYS: i64 = 50;
/// Blocks of `y` per π of latitude.
pub const LATITUDE_SCALE: f64 = 80_000.0;
/// Axial tilt in degrees.
pub const AXIAL_TILT_DEGREES: f64 = -23.44;

/// Latitude in radians for a world `y`, in `[0, 2π)`.
pub fn latitude(y: f64) -> f64 {
    (y / LATITUDE_SCALE * PI).rem_euclid(TAU)
}

/// In-game calendar: whole days plus the fraction of the current day.
///
/// `day_time` is always kept in `[0, 1)`; overflow carries into `day`.
/// Sun trigonometry derived from the clock is cached and refreshed on every
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateClock {
    day: i64,
    day_time: f64,
    season: f64,
    sin_declination: f64,
    cos_declination: f64,
    sin_hour: f64,
    cos_hour: f64,
}

impl Default for ClimateClock {
    fn default() -> Self {
        Self::new(0, 0.0)
    }
}

impl ClimateClock {
    /// Clock at `day` and `day_time`; the time is normalized with carry.
    pub fn new(day: i64, day_time: f64) -> Self {
        let mut clock = Self {
            day,
            day_time: 0.0,
            season: 0.0,
            sin_declination: 0.0,
            cos_declination: 1.0,
            sin_hour: 0.0,
            cos_hour: 1.0,
        };
        clock.set_day_time(day_time);
        clock
    }

    pub fn day(&self) -> i64 {
        self.day
    }

    /// Fraction of the day in `[0, 1)`; 0.5 is noon.
    pub fn day_time(&self) -> f64 {
        self.day_time
    }

    pub fn set_day(&mut self, day: i64) {
        self.day = day;
        self.refresh();
    }

    /// Set the time of day, carrying whole days into `day`.
    ///
    /// Non-finite input is ignored.
    pub fn set_day_time(&mut self, day_time: f64) {
        if !day_time.is_finite() {
            warn!(day_time, "ignoring non-finite day time");
            return;
        }
        self.day_time = day_time;
        self.normalize();
        self.refresh();
    }

    /// Advance the clock by `delta` days.
    pub fn add(&mut self, delta: f64) {
        if !delta.is_finite() {
            warn!(delta, "ignoring non-finite clock delta");
            return;
        }
        self.set_day_time(self.day_time + delta);
    }

    /// Position in the year, `[0, 1)`.
    pub fn season(&self) -> f64 {
        self.season
    }

    /// Sun declination in radians.
    pub fn sun_declination(&self) -> f64 {
        self.sin_declination.asin()
    }

    /// Sun elevation above the horizon in radians at world `y`.
    pub fn sun_elevation(&self, y: f64) -> f64 {
        let lat = latitude(y);
        let value = lat.sin() * self.sin_declination
            + lat.cos() * self.cos_declination * self.cos_hour;
        value.clamp(-1.0, 1.0).asin()
    }

    /// Sun azimuth in radians, `[0, 2π)`, at world `y`.
    pub fn sun_azimuth(&self, y: f64) -> f64 {
        let lat = latitude(y);
        let tan_declination = self.sin_declination / self.cos_declination;
        let azimuth = (-self.sin_hour)
            .atan2(tan_declination * lat.cos() - lat.sin() * self.cos_hour);
        let azimuth = azimuth.rem_euclid(TAU);
        if azimuth >= TAU {
            0.0
        } else {
            azimuth
        }
    }

    fn normalize(&mut self) {
        let carry = self.day_time.floor();
        self.day = self.day.saturating_add(carry as i64);
        self.day_time -= carry;
        // Rounding of tiny negative fractions can land exactly on 1.0.
        if self.day_time >= 1.0 {
            self.day_time = 0.0;
            self.day = self.day.saturating_add(1);
        }
        if self.day_time < 0.0 {
            self.day_time = 0.0;
        }
    }

    fn refresh(&mut self) {
        self.season = ((self.day.rem_euclid(YEAR_DAYS) as f64 + self.day_time)
            / YEAR_DAYS as f64)
            % 1.0;
        let tilt = AXIAL_TILT_DEGREES.to_radians();
        self.sin_declination = (tilt.sin() * (self.season * TAU).sin()).clamp(-1.0, 1.0);
        self.cos_declination = (1.0 - self.sin_declination * self.sin_declination).sqrt();
        let hour = (self.day_time - 0.5) * TAU;
        self.sin_hour = hour.sin();
        self.cos_hour = hour.cos();
    }
}

/// All climate values of one point, computed in one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature: f64,
    pub humidity: f64,
    pub weather: f64,
    pub sun_light_reduction: f64,
}

/// Clock-independent climate noise fields.
pub struct ClimateFields {
    terrain: Arc<TerrainGenerator>,
    temperature: OpenSimplex,
    humidity: OpenSimplex,
    weather: OpenSimplex,
}

impl ClimateFields {
    /// Construct the temperature, humidity and weather noises in that order.
    pub fn new(seeds: &mut SeedStream, terrain: Arc<TerrainGenerator>) -> Self {
        Self {
            terrain,
            temperature: OpenSimplex::new(seeds.next_noise_seed()),
            humidity: OpenSimplex::new(seeds.next_noise_seed()),
            weather: OpenSimplex::new(seeds.next_noise_seed()),
        }
    }

    pub fn terrain(&self) -> &Arc<TerrainGenerator> {
        &self.terrain
    }

    /// Strength of sunlight by latitude, `[0, 1]`.
    pub fn sun_intensity(&self, y: f64) -> f64 {
        latitude(y).cos().abs()
    }

    /// Base humidity scaled down towards the poles, `[0, 1]`.
    pub fn humidity3_d(&self, x: f64, y: f64) -> f64 {
        let base = simplex_2d(&self.humidity, x / 4096.0, y / 4096.0) * 0.6
            + simplex_2d(&self.humidity, x / 512.0, y / 512.0) * 0.15
            + 0.5;
        (base * (0.4 + self.sun_intensity(y) * 0.6)).clamp(0.0, 1.0)
    }

    /// Ground humidity: base humidity raised near oceans and rivers,
    /// lowered on mountains, `[0, 1]`.
    pub fn humidity2_d(&self, humidity3: f64, layer: &TerrainGeneratorLayer) -> f64 {
        let ocean = if layer.terrain_factor < LAND_THRESHOLD {
            0.2
        } else {
            0.0
        };
        let river = (1.0 - layer.river) * 0.3;
        (humidity3 + ocean + river - layer.mountain_factor * 0.2).clamp(0.0, 1.0)
    }

    /// Clock-independent temperature in °C.
    pub fn temperature2_d(
        &self,
        x: f64,
        y: f64,
        humidity3: f64,
        layer: &TerrainGeneratorLayer,
    ) -> f64 {
        let mut temperature = -10.0 + self.sun_intensity(y) * 40.0;
        temperature += simplex_3d(&self.temperature, x / 8192.0, y / 8192.0, 0.0) * 8.0;
        temperature += simplex_3d(&self.temperature, x / 2048.0, y / 2048.0, 16.0) * 4.0;
        temperature += simplex_3d(&self.temperature, x / 256.0, y / 256.0, 32.0);
        let extreme = simplex_3d(&self.temperature, x / 16384.0, y / 16384.0, 48.0);
        if extreme.abs() > 0.6 {
            temperature += extreme.signum() * (extreme.abs() - 0.6) / 0.4 * 20.0;
        }
        temperature -= humidity3 * 4.0;
        temperature -= (layer.height - WATER_LEVEL as f64).max(0.0) * 0.06;
        temperature
    }

    /// Temperature from its clock-independent part and the current sky.
    pub fn temperature_d(&self, temperature2: f64, sun_light_reduction: f64, weather: f64) -> f64 {
        temperature2 + 5.0 - sun_light_reduction * 0.8 - weather * 6.0
    }

    /// Humidity from ground humidity and the current weather, `[0, 1]`.
    pub fn humidity_d(&self, humidity2: f64, weather: f64) -> f64 {
        (humidity2 + weather * 0.25).clamp(0.0, 1.0)
    }

    /// Weather at a position for a clock, `[0, 1]`.
    ///
    /// The rainfall exponent rises with dryness and towards local noon.
    pub fn weather_d(&self, clock: &ClimateClock, x: f64, y: f64, humidity3: f64) -> f64 {
        let time = (clock.day() as f64 + clock.day_time()) * 0.5;
        let noise = simplex_3d(&self.weather, x / 2048.0, y / 2048.0, time) * 0.5 + 0.5;
        let exponent = 4.0 - humidity3 * 3.0 + (clock.day_time() * PI).sin();
        noise.clamp(0.0, 1.0).powf(exponent).clamp(0.0, 1.0)
    }

    /// Sky light reduction, `[0, 15]`: darkness from a low sun plus clouds.
    pub fn sun_light_reduction_d(&self, sun_elevation: f64, weather: f64) -> f64 {
        let day = (sun_elevation.sin() * 4.0 + 0.3).clamp(0.0, 1.0);
        ((1.0 - day) * 12.0 + weather * 3.0).clamp(0.0, 15.0)
    }
}

/// Climate fields bound to the world clock.
#[derive(Clone)]
pub struct ClimateGenerator {
    fields: Arc<ClimateFields>,
    clock: ClimateClock,
}

impl ClimateGenerator {
    /// Construct the climate noises from the seed stream, after the terrain.
    pub fn new(seeds: &mut SeedStream, terrain: Arc<TerrainGenerator>) -> Self {
        Self::with_fields(Arc::new(ClimateFields::new(seeds, terrain)))
    }

    pub fn with_fields(fields: Arc<ClimateFields>) -> Self {
        Self {
            fields,
            clock: ClimateClock::default(),
        }
    }

    pub fn fields(&self) -> &Arc<ClimateFields> {
        &self.fields
    }

    pub fn clock(&self) -> &ClimateClock {
        &self.clock
    }

    pub fn day(&self) -> i64 {
        self.clock.day()
    }

    pub fn day_time(&self) -> f64 {
        self.clock.day_time()
    }

    pub fn set_day(&mut self, day: i64) {
        self.clock.set_day(day);
    }

    pub fn set_day_time(&mut self, day_time: f64) {
        self.clock.set_day_time(day_time);
    }

    /// Advance the clock by `delta` days.
    pub fn add(&mut self, delta: f64) {
        self.clock.add(delta);
    }

    /// Apply an authoritative clock; the latest sync wins.
    pub fn sync(&mut self, day: i64, day_time: f64) {
        self.clock = ClimateClock::new(day, day_time);
    }

    pub fn season(&self) -> f64 {
        self.clock.season()
    }

    pub fn sun_declination(&self) -> f64 {
        self.clock.sun_declination()
    }

    /// Sun elevation; independent of `x`.
    pub fn sun_elevation(&self, _x: f64, y: f64) -> f64 {
        self.clock.sun_elevation(y)
    }

    /// Sun azimuth; independent of `x`.
    pub fn sun_azimuth(&self, _x: f64, y: f64) -> f64 {
        self.clock.sun_azimuth(y)
    }

    pub fn weather(&self, x: f64, y: f64) -> f64 {
        let humidity3 = self.fields.humidity3_d(x, y);
        self.weather_d(x, y, humidity3)
    }

    pub fn weather_d(&self, x: f64, y: f64, humidity3: f64) -> f64 {
        self.fields.weather_d(&self.clock, x, y, humidity3)
    }

    pub fn sun_light_reduction(&self, x: f64, y: f64) -> f64 {
        let weather = self.weather(x, y);
        self.fields
            .sun_light_reduction_d(self.sun_elevation(x, y), weather)
    }

    pub fn temperature(&self, x: f64, y: f64) -> f64 {
        self.sample(x, y).temperature
    }

    pub fn humidity(&self, x: f64, y: f64) -> f64 {
        self.sample(x, y).humidity
    }

    /// All climate values at a point.
    pub fn sample(&self, x: f64, y: f64) -> ClimateSample {
        let layer = self.fields.terrain().generate(x, y);
        self.sample_with_layer(x, y, &layer)
    }

    /// All climate values at a point whose terrain layer is already known.
    pub fn sample_with_layer(
        &self,
        x: f64,
        y: f64,
        layer: &TerrainGeneratorLayer,
    ) -> ClimateSample {
        let fields = &self.fields;
        let humidity3 = fields.humidity3_d(x, y);
        let weather = self.weather_d(x, y, humidity3);
        let sun_light_reduction =
            fields.sun_light_reduction_d(self.clock.sun_elevation(y), weather);
        let temperature2 = fields.temperature2_d(x, y, humidity3, layer);
        let humidity2 = fields.humidity2_d(humidity3, layer);
        ClimateSample {
            temperature: fields.temperature_d(temperature2, sun_light_reduction, weather),
            humidity: fields.humidity_d(humidity2, weather),
            weather,
            sun_light_reduction,
        }
    }
}
