use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::{Chunk, ChunkPos};

/// Resident chunks of one world, bounded by an LRU capacity.
///
/// Iteration is in `ChunkPos` order so season and weather passes visit
/// chunks identically on every run. Chunks pushed out by [`insert`] are
/// returned, never dropped, so the owner can write dirty ones back.
///
/// [`insert`]: ChunkStorage::insert
pub struct ChunkStorage {
    resident: BTreeMap<ChunkPos, Chunk>,
    recency: LruCache<ChunkPos, ()>,
}

impl ChunkStorage {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            resident: BTreeMap::new(),
            recency: LruCache::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.recency.cap().get()
    }

    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.resident.contains_key(&pos)
    }

    /// Make `chunk` resident and most recently used. Replacing a resident
    /// chunk at the same position never evicts.
    pub fn insert(&mut self, chunk: Chunk) -> Vec<Chunk> {
        let pos = chunk.position();
        let mut evicted = Vec::new();
        if !self.resident.contains_key(&pos) {
            while self.resident.len() >= self.capacity() {
                let Some((oldest, ())) = self.recency.pop_lru() else {
                    break;
                };
                evicted.extend(self.resident.remove(&oldest));
            }
        }
        self.resident.insert(pos, chunk);
        self.recency.put(pos, ());
        evicted
    }

    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.resident.get(&pos)
    }

    /// Mutable access that also marks the chunk as recently used.
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        let chunk = self.resident.get_mut(&pos)?;
        self.recency.promote(&pos);
        Some(chunk)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.resident.values()
    }

    /// Visit every chunk in position order; recency is left untouched.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> + '_ {
        self.resident.values_mut()
    }

    /// Chunks with unsaved changes.
    pub fn dirty(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.resident.values().filter(|chunk| chunk.is_dirty())
    }

    /// Mark every resident chunk as saved.
    pub fn clear_dirty(&mut self) {
        for chunk in self.resident.values_mut() {
            chunk.take_dirty_flags();
        }
    }
}
