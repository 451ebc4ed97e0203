//! Noise layers for terrain and climate generation.
//!
//! Provides deterministic coherent noise (fractal open-simplex) and the
//! integer "random layers" used to pick decorators per chunk. Every function
//! here is a pure function of its seed and input, and every output is clamped
//! to its documented range so generation formulas never see NaN.

use noise::{NoiseFn, OpenSimplex};

/// Octave settings of a [`NoiseGenerator`].
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    pub octaves: u32,
    /// Frequency factor from one octave to the next.
    pub lacunarity: f64,
    /// Amplitude factor from one octave to the next.
    pub persistence: f64,
    /// Frequency of the first octave, in cycles per block.
    pub frequency: f64,
    pub seed: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 1.0,
            seed: 0,
        }
    }
}

impl NoiseConfig {
    /// Fractal config with the given octave count and base wavelength in blocks.
    pub fn new(seed: u32, octaves: u32, wavelength: f64) -> Self {
        Self {
            octaves,
            frequency: 1.0 / wavelength,
            seed,
            ..Default::default()
        }
    }

    /// Override the amplitude falloff between octaves.
    pub fn persistence(mut self, persistence: f64) -> Self {
        self.persistence = persistence;
        self
    }
}

/// Clamp a raw noise sample into `[-1, 1]`, mapping NaN to zero.
#[inline]
pub fn range_safe(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

/// Single-octave open-simplex noise sampled in 2D, range-safe.
#[inline]
pub fn simplex_2d(noise: &OpenSimplex, x: f64, y: f64) -> f64 {
    range_safe(noise.get([x, y]))
}

/// Single-octave open-simplex noise sampled in 3D, range-safe.
#[inline]
pub fn simplex_3d(noise: &OpenSimplex, x: f64, y: f64, z: f64) -> f64 {
    range_safe(noise.get([x, y, z]))
}

/// Fractal open-simplex noise; every sample is in `[-1, 1]`.
pub struct NoiseGenerator {
    simplex: OpenSimplex,
    config: NoiseConfig,
}

impl NoiseGenerator {
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            simplex: OpenSimplex::new(config.seed),
            config,
        }
    }

    /// Normalized octave sum of `octave(frequency)`.
    fn fractal(&self, octave: impl Fn(f64) -> f64) -> f64 {
        let (mut sum, mut weight) = (0.0, 0.0);
        let (mut amplitude, mut frequency) = (1.0, self.config.frequency);
        for _ in 0..self.config.octaves.max(1) {
            sum += octave(frequency) * amplitude;
            weight += amplitude;
            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }
        range_safe(sum / weight)
    }

    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        self.fractal(|f| self.simplex.get([x * f, y * f]))
    }

    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        self.fractal(|f| self.simplex.get([x * f, y * f, z * f]))
    }

    /// Sample mapped to `[0, 1]`.
    pub fn sample_2d_01(&self, x: f64, y: f64) -> f64 {
        self.sample_2d(x, y) * 0.5 + 0.5
    }

    /// Ridged sample: `1 - |n|`, peaking at 1 along the noise zero crossings.
    pub fn ridged_2d(&self, x: f64, y: f64) -> f64 {
        1.0 - self.sample_2d(x, y).abs()
    }
}

/// A deterministic integer noise returning a uniform value per coordinate.
pub trait RandomLayer: Send + Sync {
    /// Value in `0..bound` for the coordinate; `0` when `bound` is zero.
    fn random(&self, x: i32, y: i32, bound: u32) -> u32;
}

/// SplitMix64 finalizer.
fn splitmix64(state: u64) -> u64 {
    let mut t = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    t = (t ^ (t >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    t = (t ^ (t >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    t ^ (t >> 31)
}

fn mix(seed: u64, x: i32, y: i32) -> u64 {
    let packed = ((x as u32 as u64) << 32) | (y as u32 as u64);
    splitmix64(seed ^ splitmix64(packed))
}

/// Base permutation layer: hashes the coordinate's cell with its seed.
#[derive(Debug, Clone, Copy)]
pub struct PermutationLayer {
    seed: u64,
    cell: i32,
}

impl PermutationLayer {
    /// Create the layer from a seed drawn from the world seed stream.
    pub const fn new(seed: u64) -> Self {
        Self { seed, cell: 1 }
    }

    /// Layer returning one value per `cell`×`cell` square.
    pub fn with_cell(seed: u64, cell: i32) -> Self {
        Self {
            seed,
            cell: cell.max(1),
        }
    }
}

impl RandomLayer for PermutationLayer {
    fn random(&self, x: i32, y: i32, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        let hash = mix(self.seed, x.div_euclid(self.cell), y.div_euclid(self.cell));
        (hash % bound as u64) as u32
    }
}

/// Jitters the query coordinate by a hashed offset within `radius` before
/// delegating to the parent layer, swirling cell borders.
pub struct SwirlLayer<L> {
    parent: L,
    seed: u64,
    radius: i32,
}

impl<L: RandomLayer> SwirlLayer<L> {
    /// Wrap `parent` with a swirl of the given radius.
    pub fn new(parent: L, seed: u64, radius: i32) -> Self {
        Self {
            parent,
            seed,
            radius: radius.max(0),
        }
    }

    /// Offset applied to the coordinate before querying the parent.
    pub fn random_offset(&self, x: i32, y: i32) -> (i32, i32) {
        let span = (self.radius as u64) * 2 + 1;
        let hash = mix(self.seed, x, y);
        let ox = (hash % span) as i32 - self.radius;
        let oy = ((hash >> 32) % span) as i32 - self.radius;
        (ox, oy)
    }
}

impl<L: RandomLayer> RandomLayer for SwirlLayer<L> {
    fn random(&self, x: i32, y: i32, bound: u32) -> u32 {
        let (ox, oy) = self.random_offset(x, y);
        self.parent
            .random(x.wrapping_add(ox), y.wrapping_add(oy), bound)
    }
}

/// Displaces the query coordinate along a smooth noise field before
/// delegating to the parent layer, giving organic region borders.
pub struct NoiseOffsetLayer<L> {
    parent: L,
    noise: OpenSimplex,
    scale: f64,
    amplitude: f64,
}

impl<L: RandomLayer> NoiseOffsetLayer<L> {
    /// Wrap `parent`; `scale` is the noise wavelength, `amplitude` the max offset.
    pub fn new(parent: L, seed: u32, scale: f64, amplitude: f64) -> Self {
        Self {
            parent,
            noise: OpenSimplex::new(seed),
            scale,
            amplitude,
        }
    }

    /// Offset applied to the coordinate before querying the parent.
    pub fn random_offset(&self, x: i32, y: i32) -> (i32, i32) {
        let nx = x as f64 / self.scale;
        let ny = y as f64 / self.scale;
        let ox = simplex_3d(&self.noise, nx, ny, 0.0) * self.amplitude;
        let oy = simplex_3d(&self.noise, nx, ny, 64.0) * self.amplitude;
        (ox.round() as i32, oy.round() as i32)
    }
}

impl<L: RandomLayer> RandomLayer for NoiseOffsetLayer<L> {
    fn random(&self, x: i32, y: i32, bound: u32) -> u32 {
        let (ox, oy) = self.random_offset(x, y);
        self.parent
            .random(x.wrapping_add(ox), y.wrapping_add(oy), bound)
    }
}
