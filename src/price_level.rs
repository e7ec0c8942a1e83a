//! Price Level - aggregate of all resting quantity at one price on one side.

use rust_decimal::Decimal;

/// Resting liquidity at a single price.
///
/// `order_count` is bumped by every batch update applied to the level, fills
/// included, so it counts updates rather than live orders.
#[repr(C)]
#[repr(align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PriceLevel {
    /// Level price
    pub price: Decimal,
    /// Sum of resting quantity at this price
    pub total_quantity: u32,
    /// Number of updates applied through the batch updater
    pub order_count: u32,
    /// Alignment padding, always zero
    pub _padding: u32,
}

impl PriceLevel {
    /// Create an empty level at `price` (zero quantity and count)
    #[inline]
    pub const fn new(price: Decimal) -> Self {
        Self {
            price,
            total_quantity: 0,
            order_count: 0,
            _padding: 0,
        }
    }

    /// Returns true if no quantity rests at this level
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.total_quantity == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_level_is_empty() {
        let level = PriceLevel::new(Decimal::from(100));
        assert!(level.is_empty());
        assert_eq!(level.price, Decimal::from(100));
        assert_eq!(level.total_quantity, 0);
        assert_eq!(level.order_count, 0);
    }

    #[test]
    fn test_level_alignment() {
        assert_eq!(std::mem::align_of::<PriceLevel>(), 16);
        assert_eq!(std::mem::size_of::<PriceLevel>() % 16, 0);
    }
}
