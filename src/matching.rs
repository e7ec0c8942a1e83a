//! Matching Core - the limit-order batch path and the market-order walk.
//!
//! Limit orders never cross: they only add quantity to their own side's level,
//! four levels per vector pass. Market orders walk the opposite side from the
//! best price outward:
//! 1. BUY: asks ascending (lowest first)
//! 2. SELL: bids descending (highest first)
//!
//! Nothing here locks; the caller holds the book's exclusive lock.

use tracing::{trace, warn};

use crate::batch::{apply_batch, apply_single, credit, debit, BatchKernel, LevelBatch};
use crate::order::{MatchResult, Order};
use crate::sides::BookSides;

/// Book sides plus the kernel used to update them
pub struct MatchingCore {
    /// Bid and ask levels
    pub sides: BookSides,
    /// Lane kernel for batch updates
    kernel: BatchKernel,
}

impl MatchingCore {
    /// Create an empty core with room for `level_capacity` levels
    pub fn new(level_capacity: usize, kernel: BatchKernel) -> Self {
        Self {
            sides: BookSides::with_capacity(level_capacity),
            kernel,
        }
    }

    #[inline]
    pub fn kernel(&self) -> BatchKernel {
        self.kernel
    }

    /// Add every order in `orders` to its own side.
    ///
    /// Each order credits its quantity to the level at its price (created on
    /// first use) and bumps that level's `order_count`. Updates are grouped
    /// four at a time; a batch is flushed early rather than carry two lanes for
    /// the same level. Zero-quantity orders are skipped.
    ///
    /// # Returns
    /// Number of orders applied
    pub fn apply_limit_batch(&mut self, orders: &[Order]) -> usize {
        let mut batch = LevelBatch::new();
        let mut applied = 0;

        for order in orders {
            if order.quantity == 0 {
                warn!(id = %order.id, "ignoring zero-quantity limit order");
                continue;
            }

            let index = self.sides.get_or_create_level(order.side, order.price);
            if batch.contains(index) {
                self.flush(&mut batch);
            }
            batch.push(index, credit(order.quantity));
            applied += 1;

            if batch.is_full() {
                self.flush(&mut batch);
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch);
        }

        applied
    }

    #[inline]
    fn flush(&mut self, batch: &mut LevelBatch) {
        apply_batch(&mut self.sides.arena, batch, self.kernel);
        batch.clear();
    }

    /// Consume liquidity on the side opposite `order.side`.
    ///
    /// Each visited level fills `min(remaining, level total)`, emitting one
    /// [`MatchResult`] at the level's price tagged with the market order's own
    /// id. The fill is debited through the single-level update path (which also
    /// bumps `order_count`). A level that reaches zero is removed.
    ///
    /// # Returns
    /// Fills in walk order. Their sum is below `order.quantity` when the
    /// opposite side runs dry; that is not an error.
    pub fn match_market(&mut self, order: &Order) -> Vec<MatchResult> {
        let mut matches = Vec::new();
        let mut remaining = order.quantity;
        let maker_side = order.side.opposite();

        while remaining > 0 {
            let (price, index) = match self.sides.best_opposite(order.side) {
                Some(best) => best,
                None => break, // No liquidity on opposite side
            };

            let level = *self.sides.arena.get(index);
            let matched = remaining.min(level.total_quantity);

            if matched > 0 {
                matches.push(MatchResult::new(matched, level.price, order.id));
                // Bounded by the level total, so the debit cannot wrap
                apply_single(&mut self.sides.arena, index, debit(matched));
                remaining -= matched;
                trace!(id = %order.id, %price, matched, remaining, "fill");
            }

            if self.sides.arena.get(index).is_empty() {
                self.sides.remove_level(maker_side, price);
            }
        }

        matches
    }
}

impl std::fmt::Debug for MatchingCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingCore")
            .field("sides", &self.sides)
            .field("kernel", &self.kernel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Side;
    use rust_decimal::Decimal;

    const KERNELS: [BatchKernel; 2] = [BatchKernel::Vector, BatchKernel::Scalar];

    fn limit(side: Side, price: i64, qty: u32) -> Order {
        Order::limit(side, Decimal::from(price), qty, "L", 0)
    }

    fn market(side: Side, qty: u32) -> Order {
        Order::market(side, qty, "MARKET1", 0)
    }

    #[test]
    fn test_limit_orders_accumulate() {
        for kernel in KERNELS {
            let mut core = MatchingCore::new(16, kernel);
            core.apply_limit_batch(&[limit(Side::Buy, 100, 1000)]);
            core.apply_limit_batch(&[limit(Side::Buy, 100, 500)]);

            let level = core.sides.level(Side::Buy, Decimal::from(100)).unwrap();
            assert_eq!(level.total_quantity, 1500);
            assert_eq!(level.order_count, 2);
        }
    }

    #[test]
    fn test_batch_with_repeated_level_loses_nothing() {
        for kernel in KERNELS {
            let mut core = MatchingCore::new(16, kernel);
            let orders = [
                limit(Side::Sell, 101, 10),
                limit(Side::Sell, 101, 20),
                limit(Side::Sell, 102, 30),
                limit(Side::Sell, 101, 40),
                limit(Side::Sell, 103, 50),
                limit(Side::Buy, 99, 60),
                limit(Side::Sell, 102, 70),
            ];

            assert_eq!(core.apply_limit_batch(&orders), orders.len());

            let l101 = core.sides.level(Side::Sell, Decimal::from(101)).unwrap();
            assert_eq!((l101.total_quantity, l101.order_count), (70, 3));
            let l102 = core.sides.level(Side::Sell, Decimal::from(102)).unwrap();
            assert_eq!((l102.total_quantity, l102.order_count), (100, 2));
            let l103 = core.sides.level(Side::Sell, Decimal::from(103)).unwrap();
            assert_eq!((l103.total_quantity, l103.order_count), (50, 1));
            let l99 = core.sides.level(Side::Buy, Decimal::from(99)).unwrap();
            assert_eq!((l99.total_quantity, l99.order_count), (60, 1));
        }
    }

    #[test]
    fn test_zero_quantity_limit_creates_no_level() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        assert_eq!(core.apply_limit_batch(&[limit(Side::Buy, 100, 0)]), 0);
        assert!(core.sides.is_empty());
    }

    #[test]
    fn test_market_no_liquidity() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[limit(Side::Buy, 100, 100)]);

        // Buy against empty asks
        assert!(core.match_market(&market(Side::Buy, 100)).is_empty());
        // Bids untouched
        assert_eq!(core.sides.best_bid(), Some(Decimal::from(100)));
    }

    #[test]
    fn test_full_match_removes_level() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[limit(Side::Sell, 100, 100)]);

        let matches = core.match_market(&market(Side::Buy, 100));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].quantity, 100);
        assert_eq!(matches[0].price, Decimal::from(100));
        assert_eq!(matches[0].aggressor_id.as_str(), "MARKET1");
        assert!(core.sides.is_empty());
        assert!(core.sides.arena.is_empty());
    }

    #[test]
    fn test_partial_match_level_remains() {
        for kernel in KERNELS {
            let mut core = MatchingCore::new(16, kernel);
            core.apply_limit_batch(&[limit(Side::Sell, 100, 1000)]);

            let matches = core.match_market(&market(Side::Buy, 600));
            assert_eq!(matches.len(), 1);
            assert_eq!(matches[0].quantity, 600);

            let level = core.sides.level(Side::Sell, Decimal::from(100)).unwrap();
            assert_eq!(level.total_quantity, 400);
            // One insertion plus one fill, both through the updater
            assert_eq!(level.order_count, 2);
        }
    }

    #[test]
    fn test_match_multiple_levels() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[
            limit(Side::Sell, 100, 500),
            limit(Side::Sell, 101, 500),
            limit(Side::Sell, 102, 500),
        ]);

        let matches = core.match_market(&market(Side::Buy, 800));

        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].quantity, matches[0].price), (500, Decimal::from(100)));
        assert_eq!((matches[1].quantity, matches[1].price), (300, Decimal::from(101)));
        assert_eq!(core.sides.best_ask(), Some(Decimal::from(101)));
        assert_eq!(core.sides.level_count(Side::Sell), 2);
    }

    #[test]
    fn test_buy_walks_asks_ascending() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        // Inserted worst-first
        core.apply_limit_batch(&[
            limit(Side::Sell, 102, 100),
            limit(Side::Sell, 100, 100),
            limit(Side::Sell, 101, 100),
        ]);

        let prices: Vec<_> = core
            .match_market(&market(Side::Buy, 250))
            .iter()
            .map(|m| m.price)
            .collect();

        assert_eq!(prices, vec![Decimal::from(100), Decimal::from(101), Decimal::from(102)]);
    }

    #[test]
    fn test_sell_walks_bids_descending() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[
            limit(Side::Buy, 98, 100),
            limit(Side::Buy, 100, 100),
            limit(Side::Buy, 99, 100),
        ]);

        let matches = core.match_market(&market(Side::Sell, 150));

        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].quantity, matches[0].price), (100, Decimal::from(100)));
        assert_eq!((matches[1].quantity, matches[1].price), (50, Decimal::from(99)));
        assert_eq!(core.sides.best_bid(), Some(Decimal::from(99)));
        assert_eq!(
            core.sides.level(Side::Buy, Decimal::from(98)).unwrap().total_quantity,
            100,
            "worst bid must be untouched"
        );
    }

    #[test]
    fn test_insufficient_liquidity_partial_fill() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[limit(Side::Sell, 100, 500)]);

        let matches = core.match_market(&market(Side::Buy, 1000));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].quantity, 500);
        assert_eq!(core.sides.level_count(Side::Sell), 0);
    }

    #[test]
    fn test_zero_quantity_market_order() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[limit(Side::Sell, 100, 500)]);

        assert!(core.match_market(&market(Side::Buy, 0)).is_empty());
        assert_eq!(core.sides.level(Side::Sell, Decimal::from(100)).unwrap().total_quantity, 500);
    }

    #[test]
    fn test_freed_level_slot_is_reused() {
        let mut core = MatchingCore::new(16, BatchKernel::Vector);
        core.apply_limit_batch(&[limit(Side::Sell, 100, 10)]);
        core.match_market(&market(Side::Buy, 10));
        core.apply_limit_batch(&[limit(Side::Buy, 90, 10)]);

        assert_eq!(core.sides.arena.slots(), 1);
        let level = core.sides.level(Side::Buy, Decimal::from(90)).unwrap();
        assert_eq!((level.total_quantity, level.order_count), (10, 1));
    }
}
