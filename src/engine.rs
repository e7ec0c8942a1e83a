//! Engine - background drain loop for the ingestion queue.
//!
//! Producers call `OrderBook::submit*` from any thread; one `DrainWorker`
//! busy-polls the queue and applies what it finds through the book's batch
//! and matching paths. Fills are optionally forwarded over a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::error::BookError;
use crate::order::MatchResult;
use crate::order_book::{DrainOutcome, OrderBook};

/// Idle polls before the worker starts yielding its time slice
const SPIN_LIMIT: u32 = 64;

/// Totals accumulated by one worker over its lifetime
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Drain passes that took at least one order
    pub passes: u64,
    pub limit_orders: u64,
    pub market_orders: u64,
    pub ignored: u64,
    pub fills: u64,
}

impl DrainStats {
    fn record(&mut self, outcome: &DrainOutcome) {
        self.passes += 1;
        self.limit_orders += outcome.limit_orders as u64;
        self.market_orders += outcome.market_orders as u64;
        self.ignored += outcome.ignored as u64;
        self.fills += outcome.matches.len() as u64;
    }
}

/// Handle to a running drain thread.
///
/// Dropping the handle without calling [`stop`](Self::stop) detaches the
/// thread after signalling it to exit.
pub struct DrainWorker {
    book: Arc<OrderBook>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<DrainStats>>,
}

impl DrainWorker {
    /// Start draining `book` on a new thread.
    ///
    /// Uses the book's `drain_batch` and `pin_drain_thread` settings. Every
    /// fill is sent to `fills` if given; a disconnected receiver only stops
    /// forwarding, not draining.
    pub fn spawn(book: Arc<OrderBook>, fills: Option<Sender<MatchResult>>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let book = Arc::clone(&book);
            let running = Arc::clone(&running);
            thread::spawn(move || run(&book, &running, fills))
        };

        Self {
            book,
            running,
            handle: Some(handle),
        }
    }

    /// True until [`stop`](Self::stop) is called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal the thread to exit, join it, then drain whatever producers
    /// queued in the meantime.
    ///
    /// # Errors
    /// [`BookError::WorkerPanicked`] if the drain thread panicked.
    pub fn stop(mut self) -> Result<DrainStats, BookError> {
        self.running.store(false, Ordering::Release);

        let mut stats = match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| BookError::WorkerPanicked)?,
            None => DrainStats::default(),
        };

        let batch = self.book.config().drain_batch;
        loop {
            let outcome = self.book.drain(batch);
            if outcome.is_empty() {
                break;
            }
            stats.record(&outcome);
        }

        info!(?stats, "drain worker stopped");
        Ok(stats)
    }
}

impl Drop for DrainWorker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for DrainWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainWorker")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run(book: &OrderBook, running: &AtomicBool, fills: Option<Sender<MatchResult>>) -> DrainStats {
    let config = book.config();
    if config.pin_drain_thread {
        pin_to_core();
    }
    info!(batch = config.drain_batch, pinned = config.pin_drain_thread, "drain worker started");

    let mut fills = fills;
    let mut stats = DrainStats::default();
    let mut idle = 0u32;

    while running.load(Ordering::Acquire) {
        let outcome = book.drain(config.drain_batch);
        if outcome.is_empty() {
            idle = idle.saturating_add(1);
            if idle < SPIN_LIMIT {
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
            continue;
        }

        idle = 0;
        stats.record(&outcome);
        forward(&mut fills, outcome.matches);
    }

    stats
}

fn forward(fills: &mut Option<Sender<MatchResult>>, matches: Vec<MatchResult>) {
    let Some(sender) = fills else {
        return;
    };
    for fill in matches {
        if sender.send(fill).is_err() {
            debug!("fill receiver dropped, no longer forwarding");
            *fills = None;
            return;
        }
    }
}

/// Pin the current thread to the last available CPU core.
///
/// The last core is typically isolated from OS interrupts.
fn pin_to_core() {
    if let Some(core_ids) = core_affinity::get_core_ids() {
        if let Some(last_core) = core_ids.last() {
            core_affinity::set_for_current(*last_core);
        }
    }
}
