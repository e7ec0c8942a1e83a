//! Order records and match results.
//!
//! Every type here is a plain `Copy` aggregate with fixed-width fields and no
//! owned heap memory, so values can move through the ingestion ring, the batch
//! lanes and mapped snapshot files by plain byte copies.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;

/// Capacity of an [`OrderId`] in bytes, including the terminating NUL.
pub const MAX_ID_LENGTH: usize = 16;

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    #[default]
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OrderType {
    /// Rests at its price until consumed by a market order
    #[default]
    Limit = 0,
    /// Consumes resting liquidity on the opposite side
    Market = 1,
    /// Immediate-or-cancel. Carried on the record but never matched.
    ImmediateOrCancel = 2,
}

/// Fixed-capacity client identifier.
///
/// Holds at most `MAX_ID_LENGTH - 1` bytes followed by a NUL terminator.
/// Longer input is truncated silently (at a UTF-8 character boundary).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct OrderId([u8; MAX_ID_LENGTH]);

impl OrderId {
    /// Build an id from text, truncating to the available capacity.
    pub fn new(id: &str) -> Self {
        let mut end = id.len().min(MAX_ID_LENGTH - 1);
        while !id.is_char_boundary(end) {
            end -= 1;
        }

        let mut bytes = [0u8; MAX_ID_LENGTH];
        bytes[..end].copy_from_slice(&id.as_bytes()[..end]);
        Self(bytes)
    }

    /// The id up to its terminator.
    pub fn as_str(&self) -> &str {
        let len = self.len();
        // Bytes only ever come from `new` or a zero-filled mapping.
        std::str::from_utf8(&self.0[..len]).unwrap_or_default()
    }

    /// Number of bytes before the terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(MAX_ID_LENGTH)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// Raw storage, terminator and trailing zeroes included.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; MAX_ID_LENGTH] {
        &self.0
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({:?})", self.as_str())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single order submission.
///
/// Price and quantity are taken as given; sign and range are not validated.
#[repr(C)]
#[repr(align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Order {
    /// Client identifier
    pub id: OrderId,
    /// Limit price (ignored for market orders)
    pub price: Decimal,
    /// Requested quantity
    pub quantity: u32,
    /// Buy or sell
    pub side: Side,
    /// Limit, market or IOC
    pub order_type: OrderType,
    /// Nanoseconds on the submitting book's monotonic clock
    pub timestamp: u64,
}

const _: () = assert!(
    std::mem::align_of::<Order>() == 16,
    "Order must be 16-byte aligned"
);

const _: () = assert!(
    std::mem::size_of::<Order>() <= 64,
    "Order must fit in one cache line"
);

impl Order {
    /// Create a limit order
    pub fn limit(side: Side, price: Decimal, quantity: u32, id: &str, timestamp: u64) -> Self {
        Self {
            id: OrderId::new(id),
            price,
            quantity,
            side,
            order_type: OrderType::Limit,
            timestamp,
        }
    }

    /// Create a market order. The price field is zero.
    pub fn market(side: Side, quantity: u32, id: &str, timestamp: u64) -> Self {
        Self {
            id: OrderId::new(id),
            price: Decimal::ZERO,
            quantity,
            side,
            order_type: OrderType::Market,
            timestamp,
        }
    }

    /// Side-aware priority comparison.
    ///
    /// For a buy order, `Less` means a lower price, so the maximum under this
    /// ordering is the highest bid. For a sell order the comparison is mirrored
    /// and the maximum is the lowest ask. The side of `self` decides.
    pub fn priority_cmp(&self, other: &Order) -> Ordering {
        match self.side {
            Side::Buy => self.price.cmp(&other.price),
            Side::Sell => other.price.cmp(&self.price),
        }
    }
}

/// One fill produced while walking the opposite side for a market order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(C)]
pub struct MatchResult {
    /// Filled quantity
    pub quantity: u32,
    /// Execution price (the resting level's price)
    pub price: Decimal,
    /// Id of the incoming market order that caused the fill.
    /// Levels aggregate many orders, so no resting id is available.
    pub aggressor_id: OrderId,
}

impl MatchResult {
    #[inline]
    pub fn new(quantity: u32, price: Decimal, aggressor_id: OrderId) -> Self {
        Self {
            quantity,
            price,
            aggressor_id,
        }
    }
}
