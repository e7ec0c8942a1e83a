//! Level Arena - index-addressed storage for price levels.
//!
//! Book sides map prices to 32-bit indices into one contiguous block of
//! `PriceLevel`s. Batch lanes carry these indices instead of references, with
//! `NULL_INDEX` standing in for an empty lane. Freed slots go on a free list
//! and are reused before the block grows.

use std::fmt;

use crate::price_level::PriceLevel;

/// Sentinel value representing a null/empty lane (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers"
pub type LevelIndex = u32;

/// Pre-allocated pool of price levels with O(1) allocation and release.
pub struct LevelArena {
    /// Contiguous block of levels, live and free
    levels: Vec<PriceLevel>,

    /// Indices of released slots, reused LIFO
    free: Vec<LevelIndex>,

    /// Number of live levels
    allocated_count: u32,
}

impl LevelArena {
    /// Create an arena with room for `capacity` levels before it grows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            levels: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            allocated_count: 0,
        }
    }

    /// Store `level` and return its index.
    ///
    /// # Panics
    /// Panics if the arena already holds `NULL_INDEX` slots.
    #[inline]
    pub fn alloc(&mut self, level: PriceLevel) -> LevelIndex {
        let index = match self.free.pop() {
            Some(index) => {
                self.levels[index as usize] = level;
                index
            }
            None => {
                let index = self.levels.len();
                assert!(index < NULL_INDEX as usize, "Level arena exhausted");
                self.levels.push(level);
                index as LevelIndex
            }
        };
        self.allocated_count += 1;
        index
    }

    /// Release a slot back to the free list.
    ///
    /// The caller must ensure the index is live (no double-free protection
    /// beyond debug assertions).
    #[inline]
    pub fn free(&mut self, index: LevelIndex) {
        debug_assert!((index as usize) < self.levels.len(), "Index out of bounds");
        debug_assert!(self.allocated_count > 0, "Double free detected");

        self.levels[index as usize] = PriceLevel::default();
        self.free.push(index);
        self.allocated_count -= 1;
    }

    #[inline]
    pub fn get(&self, index: LevelIndex) -> &PriceLevel {
        &self.levels[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: LevelIndex) -> &mut PriceLevel {
        &mut self.levels[index as usize]
    }

    /// Returns the number of live levels.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Returns the number of slots (live and free) ever handed out.
    #[inline]
    pub fn slots(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Drop every level and forget the free list.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.free.clear();
        self.allocated_count = 0;
    }
}

impl fmt::Debug for LevelArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelArena")
            .field("slots", &self.levels.len())
            .field("allocated", &self.allocated_count)
            .field("free", &self.free.len())
            .finish()
    }
}
