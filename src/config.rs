//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::batch::BatchKernel;
use crate::error::BookError;

/// Levels returned by a depth query when the caller does not say otherwise
pub const DEFAULT_DEPTH: usize = 5;

/// Tunables for one [`OrderBook`](crate::OrderBook) instance.
///
/// Missing JSON fields fall back to [`EngineConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ingestion ring slots, a power of two of at least 2
    pub queue_capacity: usize,
    /// Price levels pre-allocated per book (the arena grows past this)
    pub level_capacity: usize,
    /// Levels returned by `OrderBook::default_depth`
    pub default_depth: usize,
    /// Lane kernel used by the batch updater
    pub kernel: BatchKernel,
    /// Maximum queued orders taken per drain pass
    pub drain_batch: usize,
    /// Pin the drain worker to the last CPU core
    pub pin_drain_thread: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1 << 16,
            level_capacity: 1024,
            default_depth: DEFAULT_DEPTH,
            kernel: BatchKernel::Vector,
            drain_batch: 256,
            pin_drain_thread: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, BookError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BookError> {
        if self.queue_capacity < 2 || !self.queue_capacity.is_power_of_two() {
            return Err(BookError::InvalidQueueCapacity {
                capacity: self.queue_capacity,
            });
        }
        if self.drain_batch == 0 {
            return Err(BookError::InvalidConfig {
                reason: "drain_batch must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
