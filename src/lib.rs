//! # HP-OrderBook
//!
//! A single-instrument, in-memory limit order book that aggregates resting
//! quantity per price level and matches market orders against it.
//!
//! ## Design Principles
//!
//! - **Many readers, one writer**: queries share a reader/writer lock, every
//!   mutation takes it exclusively
//! - **Vectorized level updates**: limit orders are applied four levels per
//!   SIMD pass (SSE2 / NEON, scalar elsewhere)
//! - **Arena Allocation**: levels live in one index-addressed arena; freed
//!   slots are reused
//! - **Wait-free ingestion**: an optional bounded MPMC ring lets producers
//!   submit without taking the book lock
//!
//! ## Architecture
//!
//! ```text
//! add_limit_order / process_market_order ----------> [RwLock<MatchingCore>]
//!                                                            ^
//! submit_* --> [IngestQueue] --> drain / DrainWorker --------+
//!                                                            |
//!                                       best_prices / depth (shared lock)
//! ```

pub mod arena;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
#[cfg(unix)]
pub mod mmap;
pub mod order;
pub mod order_book;
pub mod price_level;
pub mod queue;
pub mod sides;

// Re-exports for convenience
pub use arena::{LevelArena, LevelIndex, NULL_INDEX};
pub use batch::{BatchKernel, LevelBatch, BATCH_WIDTH};
pub use config::{EngineConfig, DEFAULT_DEPTH};
pub use engine::{DrainStats, DrainWorker};
pub use error::BookError;
pub use matching::MatchingCore;
#[cfg(unix)]
pub use mmap::{MappedArray, MappedRecord};
pub use order::{MatchResult, Order, OrderId, OrderType, Side, MAX_ID_LENGTH};
pub use order_book::{BookStats, DrainOutcome, OrderBook};
pub use price_level::PriceLevel;
pub use queue::IngestQueue;
pub use sides::BookSides;

pub use rust_decimal::Decimal;
