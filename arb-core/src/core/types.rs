//! Fundamental value types shared across the engine: order identifiers,
//! side/type/status enums, and fixed-point price/quantity conversions.
//!
//! Per-strategy accounting (positions, P&L) lives in [`crate::domain::leg_book`]
//! using `rust_decimal::Decimal`; this module supplies the raw fixed-point
//! conversions used at the market-data boundary, where ticks arrive as
//! scaled integers and must be turned into `Decimal` without floating-point
//! round-trip error.

use std::fmt;

/// Unique identifier for an order.
///
/// Uses u128 instead of String for zero-allocation, copy semantics.
/// Format: `[timestamp_ns:64][random:32][counter:32]`, which keeps
/// identifiers unique across threads and across process restarts within
/// the same nanosecond without a central allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct OrderId(pub u128);

impl OrderId {
    #[inline(always)]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    /// Generate a new unique OrderId.
    #[inline]
    pub fn generate() -> Self {
        use rand::Rng;
        use std::time::SystemTime;

        thread_local! {
            static COUNTER: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
        }

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        let random_part: u32 = rand::thread_rng().gen();

        let counter = COUNTER.with(|c| {
            let val = c.get();
            c.set(val.wrapping_add(1));
            val
        });

        let id = ((timestamp as u128) << 64) | ((random_part as u128) << 32) | (counter as u128);
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl From<u128> for OrderId {
    #[inline(always)]
    fn from(id: u128) -> Self {
        Self(id)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// The side opposite this one.
    #[inline]
    pub const fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// +1 for Buy, -1 for Sell — useful for signed position deltas.
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum OrderType {
    Limit = 0,
    Market = 1,
    PostOnly = 2,
}

/// How an order was (or will be) matched. `Standard` orders rest in the book
/// and are classified as passive fills; `Cross`/`Match` orders take liquidity
/// immediately and are classified as aggressive fills (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum HitType {
    Standard = 0,
    Cross = 1,
    Match = 2,
}

impl HitType {
    #[inline]
    pub const fn is_aggressive(self) -> bool {
        matches!(self, HitType::Cross | HitType::Match)
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum OrderStatus {
    New = 0,
    NewConfirm = 1,
    PartiallyFilled = 2,
    Filled = 3,
    CancelRequested = 4,
    Cancelled = 5,
    Rejected = 6,
}

impl OrderStatus {
    /// Terminal statuses are removed from `OrderStats::byID` (§4.3.1 pt. 4).
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::NewConfirm | OrderStatus::PartiallyFilled | OrderStatus::CancelRequested
        )
    }
}

/// Fixed-point conversion helpers for the market-data boundary.
///
/// Ticks and shared-memory values arrive as 9-decimal scaled integers;
/// everything downstream of the boundary uses `rust_decimal::Decimal`.
pub mod fixed_point {
    use rust_decimal::Decimal;

    /// Scale factor for 9 decimal places, matching the wire format described
    /// in §6 for `MarketTick` price fields.
    pub const SCALE: i64 = 1_000_000_000;

    /// Convert a 9-decimal fixed-point integer to `Decimal`.
    #[inline]
    pub fn to_decimal(raw: i64) -> Decimal {
        Decimal::new(raw, 9)
    }

    /// Convert a `Decimal` to a 9-decimal fixed-point integer, rounding to
    /// the nearest representable tick.
    #[inline]
    pub fn from_decimal(value: Decimal) -> i64 {
        (value * Decimal::from(SCALE))
            .round()
            .try_into()
            .unwrap_or(if value.is_sign_negative() { i64::MIN } else { i64::MAX })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use rust_decimal_macros::dec;

        #[test]
        fn round_trips_whole_and_fractional_prices() {
            assert_eq!(to_decimal(50_000_000_000_000), dec!(50000));
            assert_eq!(from_decimal(dec!(50000)), 50_000_000_000_000);
            assert_eq!(to_decimal(1_500_000_000), dec!(1.5));
        }

        #[test]
        fn from_decimal_rounds_to_nearest_tick() {
            assert_eq!(from_decimal(dec!(1.0000000004)), 1_000_000_000);
            assert_eq!(from_decimal(dec!(1.0000000006)), 1_000_000_001);
        }
    }
}
