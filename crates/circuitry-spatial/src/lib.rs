//! Spatial chunk index for circuit elements.
//!
//! Partitions the unbounded canvas into square chunks so viewport queries
//! only visit the cells they overlap, and reclaims empty chunks far from the
//! viewport in least-recently-used order.

use std::collections::{BTreeMap, BTreeSet};

use circuitry_core::id::ElementId;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod lru;
pub mod runtime;

pub use lru::RecencyTracker;
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the canvas grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Identifies a chunk: canvas coordinates divided by the chunk size,
/// rounded toward negative infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cy: i32,
}

impl ChunkKey {
    pub fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }

    /// Chebyshev (chessboard) distance in chunks.
    pub fn distance(&self, other: &ChunkKey) -> u32 {
        self.cx
            .abs_diff(other.cx)
            .max(self.cy.abs_diff(other.cy))
    }
}

/// Tunables for the chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Side length of a chunk in canvas units.
    pub chunk_size: i32,
    /// Empty chunks within this many chunks of the viewport center are kept.
    pub eviction_margin: u32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32,
            eviction_margin: 4,
        }
    }
}

/// A bucket of elements sharing one chunk key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    elements: BTreeSet<ElementId>,
}

impl Chunk {
    pub fn elements(&self) -> &BTreeSet<ElementId> {
        &self.elements
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ChunkIndex
// ---------------------------------------------------------------------------

/// Element membership per chunk, plus the recency order used for eviction.
///
/// Chunks are created lazily. Every chunk in the index is also tracked by
/// the recency structure, so eviction can reach all of them.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    chunk_size: i32,
    chunks: BTreeMap<ChunkKey, Chunk>,
    recency: RecencyTracker<ChunkKey>,
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new(ChunkConfig::default().chunk_size)
    }
}

impl ChunkIndex {
    /// Create an empty index. A non-positive size is raised to one.
    pub fn new(chunk_size: i32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: BTreeMap::new(),
            recency: RecencyTracker::new(),
        }
    }

    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    pub fn key_for(&self, pos: GridPosition) -> ChunkKey {
        ChunkKey::new(
            pos.x.div_euclid(self.chunk_size),
            pos.y.div_euclid(self.chunk_size),
        )
    }

    // -- Lookup --

    /// The chunk containing `pos`, optionally allocating an empty one.
    pub fn get_chunk(&mut self, pos: GridPosition, create_if_missing: bool) -> Option<&Chunk> {
        let key = self.key_for(pos);
        if create_if_missing {
            return Some(self.entry(key));
        }
        self.chunks.get(&key)
    }

    /// Look up a chunk by key without creating or touching it.
    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    fn entry(&mut self, key: ChunkKey) -> &mut Chunk {
        if !self.chunks.contains_key(&key) {
            self.recency.touch(key);
        }
        self.chunks.entry(key).or_default()
    }

    // -- Membership --

    /// Add an element to the chunk containing `pos`.
    pub fn insert(&mut self, id: ElementId, pos: GridPosition) -> ChunkKey {
        let key = self.key_for(pos);
        self.entry(key).elements.insert(id);
        key
    }

    /// Drop an element from the chunk containing `pos`. The chunk itself is
    /// kept until eviction.
    pub fn remove(&mut self, id: ElementId, pos: GridPosition) -> bool {
        let key = self.key_for(pos);
        self.chunks
            .get_mut(&key)
            .is_some_and(|chunk| chunk.elements.remove(&id))
    }

    /// Move an element between the chunks of two positions.
    pub fn relocate(&mut self, id: ElementId, from: GridPosition, to: GridPosition) -> ChunkKey {
        let (old, new) = (self.key_for(from), self.key_for(to));
        if old != new {
            self.remove(id, from);
        }
        self.insert(id, to)
    }

    // -- Viewport --

    /// Touch every existing chunk overlapping the rectangle `min..=max` and
    /// return their keys. No chunks are created.
    pub fn touch_rect(&mut self, min: GridPosition, max: GridPosition) -> Vec<ChunkKey> {
        let lo = self.key_for(GridPosition::new(min.x.min(max.x), min.y.min(max.y)));
        let hi = self.key_for(GridPosition::new(min.x.max(max.x), min.y.max(max.y)));
        let keys: Vec<ChunkKey> = self
            .chunks
            .range(ChunkKey::new(lo.cx, lo.cy)..=ChunkKey::new(hi.cx, hi.cy))
            .map(|(k, _)| *k)
            .filter(|k| k.cy >= lo.cy && k.cy <= hi.cy)
            .collect();
        for &key in &keys {
            self.recency.touch(key);
        }
        keys
    }

    // -- Eviction --

    /// Walk chunks least-recently-used first and delete every one that is
    /// empty and farther than `margin` chunks from `center`. Chunks holding
    /// any element are never evicted. Returns the number deleted.
    pub fn evict(&mut self, center: GridPosition, margin: u32) -> usize {
        let center_key = self.key_for(center);
        let doomed: Vec<ChunkKey> = self
            .recency
            .oldest_first()
            .filter(|key| {
                self.chunks
                    .get(key)
                    .is_none_or(|chunk| chunk.is_empty() && key.distance(&center_key) > margin)
            })
            .collect();
        for key in &doomed {
            self.chunks.remove(key);
            self.recency.remove(*key);
        }
        if !doomed.is_empty() {
            debug!(
                evicted = doomed.len(),
                remaining = self.chunks.len(),
                "evicted chunks"
            );
        }
        doomed.len()
    }

    // -- Stats --

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn recency(&self) -> &RecencyTracker<ChunkKey> {
        &self.recency
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkKey, &Chunk)> {
        self.chunks.iter()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.recency.clear();
    }
}
