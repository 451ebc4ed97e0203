#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod registry;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use registry::{RegistryKey, RegistryKeyError, DEFAULT_NAMESPACE};

/// Seed of a world; the sole source of determinism for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(pub u64);

impl fmt::Display for WorldSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an entity inside one world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single PRNG stream every generator of a world draws its seeds from.
///
/// Generators must pull their seeds in a fixed order: the order in which
/// they are constructed is part of the world format, and reordering it
/// changes every generated chunk.
pub struct SeedStream {
    rng: StdRng,
}

impl SeedStream {
    /// Open the stream for a world seed.
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.0),
        }
    }

    /// Draw the next 64-bit seed.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Draw the next seed folded to the 32 bits accepted by noise functions.
    pub fn next_noise_seed(&mut self) -> u32 {
        let seed = self.next_seed();
        (seed ^ (seed >> 32)) as u32
    }
}

/// Order-dependent hash of a chunk coordinate: `(17 * 31 + x) * 31 + y`.
pub fn chunk_hash(x: i32, y: i32) -> i64 {
    let hash = 17i64.wrapping_mul(31).wrapping_add(x as i64);
    hash.wrapping_mul(31).wrapping_add(y as i64)
}

/// Chunk-local RNG reproducible from the chunk coordinate and a generator offset.
pub fn chunk_rng(x: i32, y: i32, seed_offset: i64) -> StdRng {
    StdRng::seed_from_u64(chunk_hash(x, y).wrapping_add(seed_offset) as u64)
}

/// Helper to derive a reproducible RNG seeded by world + domain salt.
pub fn scoped_rng(world_seed: WorldSeed, domain: u64) -> StdRng {
    StdRng::seed_from_u64(world_seed.0 ^ domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn seed_stream_is_reproducible() {
        let mut a = SeedStream::new(WorldSeed(42));
        let mut b = SeedStream::new(WorldSeed(42));
        for _ in 0..16 {
            assert_eq!(a.next_seed(), b.next_seed());
        }
    }

    #[test]
    fn seed_stream_order_matters() {
        let mut stream = SeedStream::new(WorldSeed(7));
        let first = stream.next_seed();
        let second = stream.next_seed();
        assert_ne!(first, second);
    }

    #[test]
    fn chunk_hash_is_order_dependent() {
        assert_eq!(chunk_hash(0, 0), 17 * 31 * 31);
        assert_eq!(chunk_hash(1, 0), (17 * 31 + 1) * 31);
        assert_ne!(chunk_hash(1, 2), chunk_hash(2, 1));
    }

    #[test]
    fn chunk_rng_reproducible() {
        let mut a = chunk_rng(-3, 9, 1234);
        let mut b = chunk_rng(-3, 9, 1234);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn entity_id_serialization() {
        let id = EntityId(99);
        let json = serde_json::to_string(&id).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        assert_eq!(id.to_string(), "#99");
    }
}
