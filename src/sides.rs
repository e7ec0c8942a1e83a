//! Book Sides - the bid and ask price-level collections.
//!
//! Each side is an ordered map from price to an arena index. Both maps iterate
//! in ascending price order, so the best bid is the *last* key and the best ask
//! the *first*. All levels of both sides live in one shared arena.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::arena::{LevelArena, LevelIndex};
use crate::order::Side;
use crate::price_level::PriceLevel;

/// Price -> arena index, ascending by price
pub type LevelMap = BTreeMap<Decimal, LevelIndex>;

/// Unsynchronized storage for both sides of one book.
pub struct BookSides {
    /// Buy levels
    pub bids: LevelMap,
    /// Sell levels
    pub asks: LevelMap,
    /// Backing storage for every level on both sides
    pub arena: LevelArena,
}

impl BookSides {
    /// Create empty sides with room for `levels` levels before the arena grows
    pub fn with_capacity(levels: usize) -> Self {
        Self {
            bids: LevelMap::new(),
            asks: LevelMap::new(),
            arena: LevelArena::with_capacity(levels),
        }
    }

    /// The level map for `side`
    #[inline]
    pub fn side(&self, side: Side) -> &LevelMap {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest bid price
    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    /// Lowest ask price
    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    /// Best level an incoming order on `side` would trade against.
    ///
    /// Buyers take the lowest ask, sellers the highest bid.
    #[inline]
    pub fn best_opposite(&self, side: Side) -> Option<(Decimal, LevelIndex)> {
        let best = match side {
            Side::Buy => self.asks.first_key_value(),
            Side::Sell => self.bids.last_key_value(),
        };
        best.map(|(price, index)| (*price, *index))
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    /// Get a price level (immutable)
    #[inline]
    pub fn level(&self, side: Side, price: Decimal) -> Option<&PriceLevel> {
        self.side(side).get(&price).map(|&index| self.arena.get(index))
    }

    /// Get or create a price level, returning its arena index.
    ///
    /// A new level starts at `price` with zero quantity and count.
    #[inline]
    pub fn get_or_create_level(&mut self, side: Side, price: Decimal) -> LevelIndex {
        let (map, arena) = match side {
            Side::Buy => (&mut self.bids, &mut self.arena),
            Side::Sell => (&mut self.asks, &mut self.arena),
        };

        match map.entry(price) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let index = arena.alloc(PriceLevel::new(price));
                debug!(?side, %price, index, "level created");
                *entry.insert(index)
            }
        }
    }

    /// Remove a level from its side and release its slot.
    pub fn remove_level(&mut self, side: Side, price: Decimal) -> Option<PriceLevel> {
        let map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let index = map.remove(&price)?;
        let level = *self.arena.get(index);
        self.arena.free(index);
        debug!(?side, %price, "level removed");
        Some(level)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Copies of the best `levels` levels of `side`.
    ///
    /// Bids come highest price first, asks lowest price first.
    pub fn depth(&self, side: Side, levels: usize) -> Vec<PriceLevel> {
        let copy = |(_, &index): (&Decimal, &LevelIndex)| *self.arena.get(index);
        match side {
            Side::Buy => self.bids.iter().rev().take(levels).map(copy).collect(),
            Side::Sell => self.asks.iter().take(levels).map(copy).collect(),
        }
    }

    /// Sum of resting quantity over every level of `side`
    pub fn total_quantity(&self, side: Side) -> u64 {
        self.side(side)
            .values()
            .map(|&index| self.arena.get(index).total_quantity as u64)
            .sum()
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Get the number of levels on a side
    #[inline]
    pub fn level_count(&self, side: Side) -> usize {
        self.side(side).len()
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Drop every level on both sides
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.arena.clear();
    }
}

impl Default for BookSides {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl std::fmt::Debug for BookSides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookSides")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .finish()
    }
}
