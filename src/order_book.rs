//! Order Book - the thread-safe public engine.
//!
//! All mutation (limit insertion, market matching, queue drains) runs under
//! the exclusive side of one reader/writer lock; best-price and depth queries
//! take the shared side. Among racing writers, order is whatever order they
//! acquire the lock in.
//!
//! Submissions can also go through the ingestion queue: `submit*` never blocks
//! and `drain` applies queued orders in queue order under a single write lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::BookError;
use crate::matching::MatchingCore;
#[cfg(unix)]
use crate::mmap::MappedArray;
use crate::order::{MatchResult, Order, OrderType, Side};
use crate::price_level::PriceLevel;
use crate::queue::IngestQueue;

/// Per-book activity counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BookStats {
    /// Limit orders applied to the book
    pub limit_orders: u64,
    /// Market orders matched (including ones that found no liquidity)
    pub market_orders: u64,
    /// Match results emitted
    pub fills: u64,
    /// Orders accepted but not applied (zero quantity, IOC)
    pub ignored: u64,
}

#[derive(Debug, Default)]
struct Counters {
    limit_orders: AtomicU64,
    market_orders: AtomicU64,
    fills: AtomicU64,
    ignored: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> BookStats {
        BookStats {
            limit_orders: self.limit_orders.load(Ordering::Relaxed),
            market_orders: self.market_orders.load(Ordering::Relaxed),
            fills: self.fills.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}

/// Result of one drain pass over the ingestion queue
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Limit orders applied
    pub limit_orders: usize,
    /// Market orders matched
    pub market_orders: usize,
    /// Orders dequeued but not applied
    pub ignored: usize,
    /// Fills from every market order in the pass, in queue order
    pub matches: Vec<MatchResult>,
}

impl DrainOutcome {
    /// Total orders taken off the queue
    #[inline]
    pub fn drained(&self) -> usize {
        self.limit_orders + self.market_orders + self.ignored
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.drained() == 0
    }
}

/// Single-instrument limit order book.
pub struct OrderBook {
    core: RwLock<MatchingCore>,
    queue: IngestQueue<Order>,
    counters: Counters,
    /// Zero point of order timestamps
    epoch: Instant,
    config: EngineConfig,
}

impl OrderBook {
    /// Create a book with the default configuration
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let queue = IngestQueue::with_capacity(config.queue_capacity);
        Self::build(config, queue)
    }

    /// Create a book from a validated configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, BookError> {
        config.validate()?;
        let queue = IngestQueue::new(config.queue_capacity)?;
        Ok(Self::build(config, queue))
    }

    fn build(config: EngineConfig, queue: IngestQueue<Order>) -> Self {
        Self {
            core: RwLock::new(MatchingCore::new(config.level_capacity, config.kernel)),
            queue,
            counters: Counters::default(),
            epoch: Instant::now(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Nanoseconds since this book was created
    #[inline]
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    // ========================================================================
    // Direct Entry Points
    // ========================================================================

    /// Add a resting limit order.
    ///
    /// Always returns `true`. Price and quantity are not validated; a
    /// zero-quantity order is accepted and ignored. Ids longer than 15 bytes
    /// are truncated.
    pub fn add_limit_order(&self, side: Side, price: Decimal, quantity: u32, id: &str) -> bool {
        let order = Order::limit(side, price, quantity, id, self.now());
        let applied = self.core.write().apply_limit_batch(std::slice::from_ref(&order));
        self.record_limits(1, applied);
        true
    }

    /// Match a market order against the opposite side.
    ///
    /// Returns the fills in price priority order. A partial or empty result
    /// means the opposite side ran out of liquidity.
    pub fn process_market_order(&self, side: Side, quantity: u32, id: &str) -> Vec<MatchResult> {
        let order = Order::market(side, quantity, id, self.now());
        let matches = self.core.write().match_market(&order);
        self.counters.market_orders.fetch_add(1, Ordering::Relaxed);
        self.counters.fills.fetch_add(matches.len() as u64, Ordering::Relaxed);
        matches
    }

    fn record_limits(&self, submitted: usize, applied: usize) {
        self.counters.limit_orders.fetch_add(applied as u64, Ordering::Relaxed);
        if submitted > applied {
            self.counters
                .ignored
                .fetch_add((submitted - applied) as u64, Ordering::Relaxed);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// `(best bid, best ask)`, each zero when its side is empty
    pub fn best_prices(&self) -> (Decimal, Decimal) {
        let core = self.core.read();
        (
            core.sides.best_bid().unwrap_or(Decimal::ZERO),
            core.sides.best_ask().unwrap_or(Decimal::ZERO),
        )
    }

    /// Copies of the best `levels` levels of `side`: bids descending, asks ascending
    pub fn depth(&self, side: Side, levels: usize) -> Vec<PriceLevel> {
        self.core.read().sides.depth(side, levels)
    }

    /// [`depth`](Self::depth) with the configured default level count
    pub fn default_depth(&self, side: Side) -> Vec<PriceLevel> {
        self.depth(side, self.config.default_depth)
    }

    /// Best ask minus best bid, if both exist and the book is not crossed
    pub fn spread(&self) -> Option<Decimal> {
        self.core.read().sides.spread()
    }

    /// Number of price levels on `side`
    pub fn level_count(&self, side: Side) -> usize {
        self.core.read().sides.level_count(side)
    }

    /// Sum of resting quantity on `side`
    pub fn total_quantity(&self, side: Side) -> u64 {
        self.core.read().sides.total_quantity(side)
    }

    /// True if neither side holds a level
    pub fn is_empty(&self) -> bool {
        self.core.read().sides.is_empty()
    }

    /// Snapshot of the activity counters
    pub fn stats(&self) -> BookStats {
        self.counters.snapshot()
    }

    /// Copy the best levels of `side` into `target` and flush it to disk.
    ///
    /// Fills at most `target.len()` records in depth order; the remaining
    /// records are zeroed so stale levels from an earlier snapshot disappear.
    ///
    /// # Returns
    /// Number of levels written
    #[cfg(unix)]
    pub fn snapshot_depth(
        &self,
        side: Side,
        target: &mut MappedArray<PriceLevel>,
    ) -> Result<usize, BookError> {
        let levels = self.depth(side, target.len());
        let slots = target.as_mut_slice();
        slots[..levels.len()].copy_from_slice(&levels);
        slots[levels.len()..].fill(PriceLevel::new(Decimal::ZERO));
        target.flush()?;

        tracing::info!(?side, levels = levels.len(), path = %target.path().display(), "depth snapshot written");
        Ok(levels.len())
    }

    // ========================================================================
    // Queued Entry Points
    // ========================================================================

    /// Enqueue an order for the next drain. Returns `false` if the queue is
    /// full or the slot was lost to another producer; the caller decides
    /// whether to retry.
    #[inline]
    pub fn submit(&self, order: Order) -> bool {
        self.queue.try_enqueue(order)
    }

    /// Enqueue a limit order (see [`submit`](Self::submit))
    pub fn submit_limit(&self, side: Side, price: Decimal, quantity: u32, id: &str) -> bool {
        self.submit(Order::limit(side, price, quantity, id, self.now()))
    }

    /// Enqueue a market order (see [`submit`](Self::submit))
    pub fn submit_market(&self, side: Side, quantity: u32, id: &str) -> bool {
        self.submit(Order::market(side, quantity, id, self.now()))
    }

    /// Approximate number of queued orders
    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Apply up to `max` queued orders in queue order.
    ///
    /// Runs of consecutive limit orders go through the batch path together;
    /// a market order first flushes the limits queued ahead of it. IOC orders
    /// are dropped and counted as ignored.
    pub fn drain(&self, max: usize) -> DrainOutcome {
        let mut outcome = DrainOutcome::default();
        if self.queue.is_empty() {
            return outcome;
        }

        let mut limits: Vec<Order> = Vec::new();
        let mut limits_seen = 0;
        {
            let mut core = self.core.write();

            for _ in 0..max {
                let order = match self.queue.try_dequeue() {
                    Some(order) => order,
                    None => break,
                };

                match order.order_type {
                    OrderType::Limit => {
                        limits.push(order);
                        limits_seen += 1;
                    }
                    OrderType::Market => {
                        if !limits.is_empty() {
                            outcome.limit_orders += core.apply_limit_batch(&limits);
                            limits.clear();
                        }
                        outcome.matches.extend(core.match_market(&order));
                        outcome.market_orders += 1;
                    }
                    OrderType::ImmediateOrCancel => {
                        warn!(id = %order.id, "dropping queued IOC order");
                        outcome.ignored += 1;
                    }
                }
            }

            if !limits.is_empty() {
                outcome.limit_orders += core.apply_limit_batch(&limits);
            }
        }

        let skipped_limits = limits_seen - outcome.limit_orders;
        outcome.ignored += skipped_limits;

        self.counters
            .limit_orders
            .fetch_add(outcome.limit_orders as u64, Ordering::Relaxed);
        self.counters
            .market_orders
            .fetch_add(outcome.market_orders as u64, Ordering::Relaxed);
        self.counters
            .fills
            .fetch_add(outcome.matches.len() as u64, Ordering::Relaxed);
        self.counters
            .ignored
            .fetch_add(outcome.ignored as u64, Ordering::Relaxed);

        outcome
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("core", &*self.core.read())
            .field("queue", &self.queue)
            .field("stats", &self.stats())
            .finish()
    }
}
