//! Ingestion Queue - bounded, non-blocking, multi-producer/multi-consumer ring.
//!
//! Each slot carries a sequence stamp that encodes its state relative to the
//! slot's logical position:
//!
//! ```text
//! sequence == pos       slot free, the producer claiming `pos` may write
//! sequence == pos + 1   slot full, the consumer claiming `pos` may read
//! sequence == pos + N   slot free again for the producer one lap later
//! ```
//!
//! Producers claim a position by CAS on `tail`, consumers by CAS on `head`.
//! Every operation makes exactly one attempt: a slot in the wrong state or a
//! lost CAS returns failure immediately, and retry policy belongs to the caller.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::error::BookError;

#[repr(align(64))]
struct Slot<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity ring of `Copy` records.
pub struct IngestQueue<T: Copy> {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    mask: u64,
    buffer: Box<[Slot<T>]>,
}

// SAFETY: a slot's value is only touched by the single thread whose CAS claimed
// its position, and the acquire/release pair on `sequence` orders the write
// before the read. Values are moved between threads, so `T: Send` suffices.
unsafe impl<T: Copy + Send> Send for IngestQueue<T> {}
unsafe impl<T: Copy + Send> Sync for IngestQueue<T> {}

impl<T: Copy> IngestQueue<T> {
    /// Create a queue with `capacity` slots.
    ///
    /// # Errors
    /// `capacity` must be a power of two of at least 2. With one slot the
    /// "full" stamp of a lap equals the "free" stamp of the next.
    pub fn new(capacity: usize) -> Result<Self, BookError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(BookError::InvalidQueueCapacity { capacity });
        }

        Ok(Self::build(capacity))
    }

    /// Create a queue with at least `capacity` slots (minimum 2), rounded up
    /// to the next power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self::build(capacity)
    }

    fn build(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let buffer = (0..capacity as u64)
            .map(|pos| Slot {
                sequence: AtomicU64::new(pos),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            mask: capacity as u64 - 1,
            buffer,
        }
    }

    /// Try to append `value`.
    ///
    /// Returns `false` without blocking when the next slot is still occupied
    /// (queue full) or another producer claimed it first.
    #[inline]
    pub fn try_enqueue(&self, value: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let slot = &self.buffer[(tail & self.mask) as usize];

        if slot.sequence.load(Ordering::Acquire) != tail {
            return false;
        }
        if self
            .tail
            .compare_exchange(tail, tail + 1, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        // SAFETY: the CAS gave this thread exclusive ownership of position
        // `tail`, and the slot stamp says no reader is still using it.
        unsafe { (*slot.value.get()).write(value) };
        slot.sequence.store(tail + 1, Ordering::Release);
        true
    }

    /// Try to take the oldest value.
    ///
    /// Returns `None` without blocking when the queue is empty, the head slot
    /// is not yet published, or another consumer claimed it first.
    #[inline]
    pub fn try_dequeue(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let slot = &self.buffer[(head & self.mask) as usize];

        if slot.sequence.load(Ordering::Acquire) != head + 1 {
            return None;
        }
        if self
            .head
            .compare_exchange(head, head + 1, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        // SAFETY: the acquire load observed the producer's release store of
        // `head + 1`, so the value is fully written, and the CAS made this
        // thread the only reader of position `head`.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.sequence.store(head + self.capacity() as u64, Ordering::Release);
        Some(value)
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Approximate number of queued values. Exact only when no other thread is
    /// operating on the queue.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.saturating_sub(head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy> fmt::Debug for IngestQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestQueue")
            .field("capacity", &self.capacity())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}
