//! Market data and trading-signal value types (§3 `MarketTick`, `TradingSignal`;
//! §6 `Instrument`).

use crate::core::types::{OrderType, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A tradable instrument. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub exchange: String,
    /// Stored as a fixed-point integer (9 decimals) so comparisons and
    /// tick-rounding stay exact; converted to `Decimal` at the edges.
    tick_size_raw: i64,
    pub lot_size: u64,
    pub price_multiplier: Decimal,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        tick_size: Decimal,
        lot_size: u64,
        price_multiplier: Decimal,
    ) -> Self {
        assert!(tick_size > Decimal::ZERO, "tickSize must be > 0");
        assert!(lot_size >= 1, "lotSize must be >= 1");
        assert!(price_multiplier > Decimal::ZERO, "priceMultiplier must be > 0");
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            tick_size_raw: crate::core::fixed_point::from_decimal(tick_size),
            lot_size,
            price_multiplier,
        }
    }

    pub fn tick_size(&self) -> Decimal {
        crate::core::fixed_point::to_decimal(self.tick_size_raw)
    }

    /// Round a price to the nearest tick.
    pub fn round_to_tick(&self, price: Decimal) -> Decimal {
        let tick = self.tick_size();
        (price / tick).round() * tick
    }
}

/// Whether a tick arrived during the pre-open auction or continuous trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedType {
    Auction,
    Continuous,
}

/// A single market-data update (§3). Price/qty level arrays are
/// best-first (index 0 = top of book) and aligned level-by-level between
/// bid and ask sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    pub symbol: String,
    pub exchange: String,
    pub timestamp_ns: u64,
    pub bid_prices: Vec<Decimal>,
    pub bid_qty: Vec<u64>,
    pub ask_prices: Vec<Decimal>,
    pub ask_qty: Vec<u64>,
    pub last_price: Decimal,
    pub total_volume: u64,
    pub turnover: Decimal,
    pub feed_type: FeedType,
}

impl MarketTick {
    /// `askPrices[0] >= bidPrices[0]` when both present (§3 invariant).
    pub fn is_crossed(&self) -> bool {
        match (self.bid_prices.first(), self.ask_prices.first()) {
            (Some(bid), Some(ask)) => ask < bid,
            _ => false,
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bid_prices.first().copied()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.ask_prices.first().copied()
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn now_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    }
}

/// Passive orders rest in the book; aggressive orders cross the spread
/// immediately to chase a hedge (§4.6.5, glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCategory {
    Passive,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

/// Produced by strategies, consumed by the order router (§3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub strategy_id: u64,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: u64,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub category: OrderCategory,
    pub quote_level: u32,
    pub metadata: serde_json::Value,
}

impl TradingSignal {
    pub fn passive(
        strategy_id: u64,
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: u64,
    ) -> Self {
        assert!(quantity > 0, "quantity must be > 0");
        Self {
            strategy_id,
            symbol: symbol.into(),
            side,
            price,
            quantity,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            category: OrderCategory::Passive,
            quote_level: 0,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn aggressive(
        strategy_id: u64,
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: u64,
    ) -> Self {
        assert!(quantity > 0, "quantity must be > 0");
        Self {
            strategy_id,
            symbol: symbol.into(),
            side,
            price,
            quantity,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Ioc,
            category: OrderCategory::Aggressive,
            quote_level: 0,
            metadata: serde_json::json!({ "order_category": "aggressive" }),
        }
    }

    pub fn with_quote_level(mut self, level: u32) -> Self {
        self.quote_level = level;
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        if let serde_json::Value::Object(ref mut map) = self.metadata {
            map.insert("reason".to_string(), serde_json::Value::String(reason.to_string()));
        } else {
            self.metadata = serde_json::json!({ "reason": reason });
        }
        self
    }

    pub fn reason(&self) -> Option<&str> {
        self.metadata.get("reason").and_then(|v| v.as_str())
    }
}

/// Order/trade callback delivered on the `order.>` subject (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: u128,
    pub strategy_id: u64,
    pub symbol: String,
    pub side: Side,
    pub status: OrderUpdateStatus,
    pub filled_qty: u64,
    pub avg_price: Decimal,
    pub price: Decimal,
    pub quantity: u64,
    pub metadata: serde_json::Value,
}

impl OrderUpdate {
    pub fn is_aggressive(&self) -> bool {
        self.metadata
            .get("order_category")
            .and_then(|v| v.as_str())
            == Some("aggressive")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderUpdateStatus {
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Canceling,
    Submitted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn instrument_rounds_to_tick() {
        let inst = Instrument::new("IF2412", "CFFEX", dec!(0.2), 1, dec!(300));
        assert_eq!(inst.round_to_tick(dec!(100.09)), dec!(100.0));
        assert_eq!(inst.round_to_tick(dec!(100.11)), dec!(100.2));
    }

    #[test]
    fn market_tick_detects_crossed_book() {
        let mut tick = MarketTick {
            symbol: "IF2412".into(),
            exchange: "CFFEX".into(),
            timestamp_ns: 0,
            bid_prices: vec![dec!(100.0)],
            bid_qty: vec![10],
            ask_prices: vec![dec!(100.2)],
            ask_qty: vec![10],
            last_price: dec!(100.1),
            total_volume: 0,
            turnover: Decimal::ZERO,
            feed_type: FeedType::Continuous,
        };
        assert!(!tick.is_crossed());
        tick.ask_prices[0] = dec!(99.9);
        assert!(tick.is_crossed());
    }

    #[test]
    fn aggressive_signal_carries_order_category_metadata() {
        let sig = TradingSignal::aggressive(1, "IF2412", Side::Sell, dec!(100.0), 10);
        assert_eq!(sig.metadata["order_category"], "aggressive");
        assert_eq!(sig.category, OrderCategory::Aggressive);
    }

    #[test]
    fn signal_reason_round_trips_through_metadata() {
        let sig = TradingSignal::passive(1, "IF2412", Side::Buy, dec!(100.0), 10)
            .with_reason("stop_loss");
        assert_eq!(sig.reason(), Some("stop_loss"));
    }
}
