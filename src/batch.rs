//! Batch Updater - apply up to four (delta, +1 count) pairs in one vector pass.
//!
//! A batch is a set of lanes, each naming a level by arena index and carrying
//! a signed quantity delta. Applying the batch gathers every lane's
//! `total_quantity` and `order_count` into 16-byte aligned lane vectors, adds
//! the deltas and a uniform `+1` across all four lanes at once, then scatters
//! the results back. Empty lanes (`NULL_INDEX`, or lanes past the batch length)
//! are loaded as zero and never stored.
//!
//! On x86_64 the vector kernel uses SSE2, on aarch64 NEON; both are part of
//! the target baseline so no runtime detection is needed. Other targets and
//! [`BatchKernel::Scalar`] run the same per-lane arithmetic in a plain loop.
//!
//! # Wraparound
//!
//! Totals are `u32` and deltas are `i32`, added with two's-complement
//! wraparound. A delta more negative than the current total wraps the total to
//! a huge value instead of failing. Nothing here checks for it: callers must
//! bound every debit by the level's current total, as the matching walk does.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use crate::arena::{LevelArena, LevelIndex, NULL_INDEX};

/// Number of lanes processed per pass
pub const BATCH_WIDTH: usize = 4;

/// Which lane kernel applies a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKernel {
    /// SSE2/NEON where the target has it, scalar lanes elsewhere
    #[default]
    Vector,
    /// Plain per-lane loop with identical arithmetic
    Scalar,
}

/// Four lanes in one 16-byte aligned register image
#[repr(C)]
#[repr(align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lanes<T>(pub [T; BATCH_WIDTH]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Lane {
    level: LevelIndex,
    delta: i32,
}

/// Up to `BATCH_WIDTH` pending level updates.
#[derive(Clone, Debug, Default)]
pub struct LevelBatch {
    lanes: ArrayVec<Lane, BATCH_WIDTH>,
}

impl LevelBatch {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an update. Returns `false` (and drops nothing) if the batch is full.
    #[inline]
    pub fn push(&mut self, level: LevelIndex, delta: i32) -> bool {
        self.lanes.try_push(Lane { level, delta }).is_ok()
    }

    /// True if a non-empty lane already targets `level`.
    #[inline]
    pub fn contains(&self, level: LevelIndex) -> bool {
        level != NULL_INDEX && self.lanes.iter().any(|lane| lane.level == level)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.lanes.is_full()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.lanes.clear();
    }
}

/// Delta that credits `quantity` to a level.
///
/// Reinterprets the bits, so quantities above `i32::MAX` still add exactly
/// modulo 2^32.
#[inline]
pub const fn credit(quantity: u32) -> i32 {
    quantity as i32
}

/// Delta that debits `quantity` from a level (two's-complement negation).
#[inline]
pub const fn debit(quantity: u32) -> i32 {
    (quantity as i32).wrapping_neg()
}

/// Apply every lane of `batch` to its level in one vector pass.
///
/// Lanes must target distinct levels; two lanes on the same level would both
/// load the old value and the second store would win.
pub fn apply_batch(arena: &mut LevelArena, batch: &LevelBatch, kernel: BatchKernel) {
    debug_assert!(
        batch
            .lanes
            .iter()
            .enumerate()
            .all(|(i, lane)| !batch.lanes[..i].iter().any(|l| l.level == lane.level && l.level != NULL_INDEX)),
        "batch lanes must target distinct levels"
    );

    let mut quantities = Lanes::<u32>::default();
    let mut counts = Lanes::<u32>::default();
    let mut deltas = Lanes::<i32>::default();

    // Gather
    for (i, lane) in batch.lanes.iter().enumerate() {
        if lane.level != NULL_INDEX {
            let level = arena.get(lane.level);
            quantities.0[i] = level.total_quantity;
            counts.0[i] = level.order_count;
        }
        deltas.0[i] = lane.delta;
    }

    add_lanes(kernel, &mut quantities, &mut counts, &deltas);

    // Scatter
    for (i, lane) in batch.lanes.iter().enumerate() {
        if lane.level != NULL_INDEX {
            let level = arena.get_mut(lane.level);
            level.total_quantity = quantities.0[i];
            level.order_count = counts.0[i];
        }
    }
}

/// Single-level update: add `delta` to the total and bump the count by one.
///
/// A `NULL_INDEX` level is ignored. Same wraparound rules as [`apply_batch`].
#[inline]
pub fn apply_single(arena: &mut LevelArena, index: LevelIndex, delta: i32) {
    if index == NULL_INDEX {
        return;
    }
    let level = arena.get_mut(index);
    level.total_quantity = level.total_quantity.wrapping_add(delta as u32);
    level.order_count = level.order_count.wrapping_add(1);
}

/// Add `deltas` to `quantities` and one to every count, lane by lane.
#[inline]
pub fn add_lanes(
    kernel: BatchKernel,
    quantities: &mut Lanes<u32>,
    counts: &mut Lanes<u32>,
    deltas: &Lanes<i32>,
) {
    match kernel {
        BatchKernel::Vector => add_lanes_vector(quantities, counts, deltas),
        BatchKernel::Scalar => add_lanes_scalar(quantities, counts, deltas),
    }
}

#[inline]
fn add_lanes_scalar(quantities: &mut Lanes<u32>, counts: &mut Lanes<u32>, deltas: &Lanes<i32>) {
    for i in 0..BATCH_WIDTH {
        quantities.0[i] = quantities.0[i].wrapping_add(deltas.0[i] as u32);
        counts.0[i] = counts.0[i].wrapping_add(1);
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn add_lanes_vector(quantities: &mut Lanes<u32>, counts: &mut Lanes<u32>, deltas: &Lanes<i32>) {
    use std::arch::x86_64::{__m128i, _mm_add_epi32, _mm_load_si128, _mm_set1_epi32, _mm_store_si128};

    // SAFETY: SSE2 is in the x86_64 baseline. Each `Lanes` is 16 bytes long
    // and 16-byte aligned, as the aligned load/store intrinsics require.
    unsafe {
        let q = _mm_load_si128(quantities.0.as_ptr() as *const __m128i);
        let c = _mm_load_si128(counts.0.as_ptr() as *const __m128i);
        let d = _mm_load_si128(deltas.0.as_ptr() as *const __m128i);

        _mm_store_si128(quantities.0.as_mut_ptr() as *mut __m128i, _mm_add_epi32(q, d));
        _mm_store_si128(counts.0.as_mut_ptr() as *mut __m128i, _mm_add_epi32(c, _mm_set1_epi32(1)));
    }
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn add_lanes_vector(quantities: &mut Lanes<u32>, counts: &mut Lanes<u32>, deltas: &Lanes<i32>) {
    use std::arch::aarch64::{vaddq_u32, vdupq_n_u32, vld1q_s32, vld1q_u32, vreinterpretq_u32_s32, vst1q_u32};

    // SAFETY: NEON is in the aarch64 baseline. Each `Lanes` holds exactly four
    // 32-bit elements.
    unsafe {
        let q = vld1q_u32(quantities.0.as_ptr());
        let c = vld1q_u32(counts.0.as_ptr());
        let d = vreinterpretq_u32_s32(vld1q_s32(deltas.0.as_ptr()));

        vst1q_u32(quantities.0.as_mut_ptr(), vaddq_u32(q, d));
        vst1q_u32(counts.0.as_mut_ptr(), vaddq_u32(c, vdupq_n_u32(1)));
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn add_lanes_vector(quantities: &mut Lanes<u32>, counts: &mut Lanes<u32>, deltas: &Lanes<i32>) {
    add_lanes_scalar(quantities, counts, deltas)
}
