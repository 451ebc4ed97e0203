//! Cloud density bitmaps for the sky renderer.
//!
//! Visual only: nothing in the simulation reads clouds back.

use glam::Vec3;

use crate::noise::{NoiseConfig, NoiseGenerator};

const OCTAVES: u32 = 3;
/// Noise periods across one bitmap.
const FEATURE_SCALE: f64 = 4.0;
/// Steepness of the derived normals.
const NORMAL_STRENGTH: f32 = 4.0;

/// Square density bitmap with per-texel surface normals.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudBitmap {
    pub size: usize,
    /// Row-major densities in `[0, 1]`.
    pub density: Vec<f32>,
    /// Row-major unit normals, facing `+z` on flat areas.
    pub normals: Vec<Vec3>,
}

impl CloudBitmap {
    pub fn density_at(&self, x: usize, y: usize) -> f32 {
        self.density[y * self.size + x]
    }

    pub fn normal_at(&self, x: usize, y: usize) -> Vec3 {
        self.normals[y * self.size + x]
    }

    /// Fraction of texels with any cloud.
    pub fn coverage(&self) -> f32 {
        if self.density.is_empty() {
            return 0.0;
        }
        self.density.iter().filter(|&&d| d > 0.0).count() as f32 / self.density.len() as f32
    }
}

pub struct CloudGenerator {
    noise: NoiseGenerator,
}

impl CloudGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: NoiseGenerator::new(NoiseConfig::new(seed, OCTAVES, 1.0)),
        }
    }

    /// Generate a `size`×`size` bitmap; more weather means more coverage.
    pub fn generate(&self, size: usize, weather: f64, time: f64) -> CloudBitmap {
        let weather = if weather.is_finite() {
            weather.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let time = if time.is_finite() { time } else { 0.0 };
        let coverage = 0.25 + weather * 0.75;

        let mut density = Vec::with_capacity(size * size);
        for py in 0..size {
            for px in 0..size {
                let nx = px as f64 / size as f64 * FEATURE_SCALE;
                let ny = py as f64 / size as f64 * FEATURE_SCALE;
                let value = self.noise.sample_3d(nx, ny, time) * 0.5 + 0.5;
                let d = ((value - (1.0 - coverage)) / coverage).clamp(0.0, 1.0);
                density.push(d as f32);
            }
        }

        let normals = Self::normals(size, &density);
        CloudBitmap {
            size,
            density,
            normals,
        }
    }

    /// Central differences with wrap-around at the edges.
    fn normals(size: usize, density: &[f32]) -> Vec<Vec3> {
        let at = |x: usize, y: usize| density[y * size + x];
        let mut normals = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let left = at((x + size - 1) % size, y);
                let right = at((x + 1) % size, y);
                let down = at(x, (y + size - 1) % size);
                let up = at(x, (y + 1) % size);
                let normal = Vec3::new(
                    (left - right) * NORMAL_STRENGTH,
                    (down - up) * NORMAL_STRENGTH,
                    1.0,
                );
                normals.push(normal.normalize_or_zero());
            }
        }
        normals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_dimensions_and_ranges() {
        let clouds = CloudGenerator::new(5);
        let bitmap = clouds.generate(32, 0.5, 1.25);
        assert_eq!(bitmap.density.len(), 32 * 32);
        assert_eq!(bitmap.normals.len(), 32 * 32);
        for (d, n) in bitmap.density.iter().zip(&bitmap.normals) {
            assert!((0.0..=1.0).contains(d));
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.z > 0.0);
        }
    }

    #[test]
    fn storms_are_cloudier() {
        let clouds = CloudGenerator::new(9);
        let clear = clouds.generate(64, 0.0, 3.0);
        let storm = clouds.generate(64, 1.0, 3.0);
        assert!(storm.coverage() >= clear.coverage());
        assert_eq!(storm.coverage(), 1.0);
    }

    #[test]
    fn generation_is_deterministic() {
        let a = CloudGenerator::new(1).generate(16, 0.3, 7.5);
        let b = CloudGenerator::new(1).generate(16, 0.3, 7.5);
        assert_eq!(a, b);
    }

    #[test]
    fn clouds_drift_over_time() {
        let clouds = CloudGenerator::new(4);
        let now = clouds.generate(16, 0.5, 0.0);
        let later = clouds.generate(16, 0.5, 0.37);
        assert_ne!(now.density, later.density);
        assert_eq!(now, clouds.generate(16, 0.5, 0.0));
    }

    #[test]
    fn non_finite_inputs_are_tolerated() {
        let bitmap = CloudGenerator::new(2).generate(8, f64::NAN, f64::INFINITY);
        assert_eq!(bitmap.size, 8);
        let empty = CloudGenerator::new(2).generate(0, 0.5, 0.0);
        assert_eq!(empty.coverage(), 0.0);
        assert!(empty.normals.is_empty());
    }
}
