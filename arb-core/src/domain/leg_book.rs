//! C3 — PerLegExecutionBook (§4.3): position accounting, order lifecycle,
//! queue position, and P&L for a single leg of an instrument.

use crate::core::errors::FillError;
use crate::core::types::{HitType, OrderId, OrderStatus, Side};
use crate::domain::order_book::{OrderPriceMap, OrderStats, QueueEvent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// §3 `PerLegBook` counters group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookCounters {
    pub order_count: u64,
    pub confirm_count: u64,
    pub cancel_count: u64,
    pub reject_count: u64,
    pub cross_count: u64,
    pub improve_count: u64,
    pub trade_count: u64,
    pub last_cancel_reject_order_id: Option<u128>,
    pub last_cancel_reject_time_ns: u64,
}

/// §3 `PerLegBook` P&L group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookPnl {
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub net: Decimal,
    pub max: Decimal,
    pub drawdown: Decimal,
}

/// C3. One leg's order book, position, and P&L. Owns an `OrderPriceMap`
/// (C2) and the Chinese-futures net-position fill law (§4.3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerLegBook {
    // Position group.
    pub net_pos: Decimal,
    pub net_pos_pass: Decimal,
    pub net_pos_pass_ytd: Decimal,
    pub net_pos_agg: Decimal,
    pub buy_qty: Decimal,
    pub sell_qty: Decimal,
    pub buy_avg_price: Decimal,
    pub sell_avg_price: Decimal,

    // Order maps (C2).
    #[serde(skip)]
    pub orders: OrderPriceMap,

    pub counters: BookCounters,

    // Aggressive counters.
    pub sell_agg_order: u32,
    pub buy_agg_order: u32,

    pub pnl: BookPnl,
}

impl Default for PerLegBook {
    fn default() -> Self {
        Self {
            net_pos: Decimal::ZERO,
            net_pos_pass: Decimal::ZERO,
            net_pos_pass_ytd: Decimal::ZERO,
            net_pos_agg: Decimal::ZERO,
            buy_qty: Decimal::ZERO,
            sell_qty: Decimal::ZERO,
            buy_avg_price: Decimal::ZERO,
            sell_avg_price: Decimal::ZERO,
            orders: OrderPriceMap::new(),
            counters: BookCounters::default(),
            sell_agg_order: 0,
            buy_agg_order: 0,
            pnl: BookPnl::default(),
        }
    }
}

impl PerLegBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `netPos − netPosPassYtd` = today's net (§3 invariant).
    pub fn today_net(&self) -> Decimal {
        self.net_pos - self.net_pos_pass_ytd
    }

    pub fn is_flat(&self) -> bool {
        self.net_pos == Decimal::ZERO
    }

    /// Register a locally-originated order (pre-`NewConfirm`). Mirrors
    /// `OrderPriceMap::add`, incrementing the order counter.
    pub fn place_order(&mut self, order: OrderStats) -> Result<(), crate::core::EngineError> {
        self.counters.order_count += 1;
        self.orders.add(order)
    }

    /// §4.3.2 `NewConfirm`: order becomes active.
    pub fn confirm_new(&mut self, id: OrderId) {
        self.counters.confirm_count += 1;
        if let Some(o) = self.orders.get_by_id_mut(id) {
            o.status = OrderStatus::NewConfirm;
            o.active = true;
        }
    }

    /// §4.3.2 `CancelConfirm`: remove from both indexes.
    pub fn confirm_cancel(&mut self, id: OrderId) -> Option<OrderStats> {
        self.counters.cancel_count += 1;
        self.orders.remove_by_id(id)
    }

    /// §4.3.2 `ModifyConfirm`: atomically reindex from old to new price.
    pub fn confirm_modify(
        &mut self,
        id: OrderId,
        new_price: Decimal,
        new_qty: u64,
    ) -> Result<(), crate::core::EngineError> {
        self.orders.reprice(id, new_price, new_qty)?;
        if let Some(o) = self.orders.get_by_id_mut(id) {
            o.modify_wait = false;
        }
        Ok(())
    }

    /// §4.3.2 `NewReject`: evict from maps.
    pub fn reject_new(&mut self, id: OrderId) -> Option<OrderStats> {
        self.counters.reject_count += 1;
        self.orders.remove_by_id(id)
    }

    /// §4.3.2 `CancelReject`: leave in map, clear `cancelRequested`.
    pub fn reject_cancel(&mut self, id: OrderId, now_ns: u64) {
        self.counters.reject_count += 1;
        self.counters.last_cancel_reject_order_id = Some(id.as_u128());
        self.counters.last_cancel_reject_time_ns = now_ns;
        if let Some(o) = self.orders.get_by_id_mut(id) {
            o.cancel_requested = false;
        }
    }

    /// §4.3.2 `ModifyReject`: leave intact, clear `modifyWait`.
    pub fn reject_modify(&mut self, id: OrderId) {
        self.counters.reject_count += 1;
        if let Some(o) = self.orders.get_by_id_mut(id) {
            o.modify_wait = false;
        }
    }

    /// §4.3.2 `SelfTrade`: deactivate, no position change.
    pub fn self_trade(&mut self, id: OrderId) {
        if let Some(o) = self.orders.get_by_id_mut(id) {
            o.active = false;
        }
    }

    /// §4.3.1 fill processing: the Chinese-futures net-position fill law
    /// (closing takes priority over opening) plus the passive/aggressive
    /// classification split.
    pub fn apply_fill(
        &mut self,
        id: OrderId,
        fill_qty: u64,
        fill_price: Decimal,
    ) -> Result<(), FillError> {
        if fill_qty == 0 {
            return Err(FillError::ZeroQuantity { order_id: id.as_u128() });
        }

        let order = match self.orders.get_by_id_mut(id) {
            Some(o) => o,
            None => {
                warn!(order_id = %id, "fill references an order no longer tracked by this book");
                // Still the authoritative ledger for position math: apply
                // with a best-effort side/hit-type guess is not possible
                // without the order, so this fill cannot be applied.
                return Err(FillError::UnknownOrder {
                    order_id: id.as_u128(),
                    side: Side::Buy,
                });
            }
        };

        if fill_qty > order.open_qty {
            return Err(FillError::ExceedsRemaining {
                order_id: id.as_u128(),
                fill_qty,
                remaining_qty: order.open_qty,
            });
        }

        let side = order.side;
        let hit_type = order.hit_type;
        let prior_filled = order.filled_qty;
        order.open_qty -= fill_qty;
        order.filled_qty += fill_qty;
        let total_filled = Decimal::from(order.filled_qty);
        order.avg_fill_price = if total_filled > Decimal::ZERO {
            (order.avg_fill_price * Decimal::from(prior_filled) + fill_price * Decimal::from(fill_qty))
                / total_filled
        } else {
            fill_price
        };
        if order.open_qty == 0 {
            order.status = OrderStatus::Filled;
        } else {
            order.status = OrderStatus::PartiallyFilled;
        }
        let terminal = order.status.is_terminal();

        self.counters.trade_count += 1;
        let qty_dec = Decimal::from(fill_qty);
        self.apply_position_fill_law(side, qty_dec, fill_price);
        self.classify_fill(hit_type, side, qty_dec);

        if terminal {
            self.orders.remove_by_id(id);
        }
        Ok(())
    }

    /// Step 2 of §4.3.1: closing takes priority, remainder opens.
    fn apply_position_fill_law(&mut self, side: Side, mut qty: Decimal, price: Decimal) {
        match side {
            Side::Buy => {
                if self.net_pos < Decimal::ZERO {
                    let close_qty = qty.min(self.sell_qty);
                    self.sell_qty -= close_qty;
                    self.net_pos += close_qty;
                    qty -= close_qty;
                    if self.sell_qty == Decimal::ZERO {
                        self.sell_avg_price = Decimal::ZERO;
                    }
                }
                if qty > Decimal::ZERO {
                    let new_buy_qty = self.buy_qty + qty;
                    self.buy_avg_price = if new_buy_qty > Decimal::ZERO {
                        (self.buy_avg_price * self.buy_qty + price * qty) / new_buy_qty
                    } else {
                        price
                    };
                    self.buy_qty = new_buy_qty;
                    self.net_pos += qty;
                }
            }
            Side::Sell => {
                if self.net_pos > Decimal::ZERO {
                    let close_qty = qty.min(self.buy_qty);
                    self.buy_qty -= close_qty;
                    self.net_pos -= close_qty;
                    qty -= close_qty;
                    if self.buy_qty == Decimal::ZERO {
                        self.buy_avg_price = Decimal::ZERO;
                    }
                }
                if qty > Decimal::ZERO {
                    let new_sell_qty = self.sell_qty + qty;
                    self.sell_avg_price = if new_sell_qty > Decimal::ZERO {
                        (self.sell_avg_price * self.sell_qty + price * qty) / new_sell_qty
                    } else {
                        price
                    };
                    self.sell_qty = new_sell_qty;
                    self.net_pos -= qty;
                }
            }
        }
    }

    /// Step 3 of §4.3.1: classify into `netPosPass` vs `netPosAgg`.
    fn classify_fill(&mut self, hit_type: HitType, side: Side, qty: Decimal) {
        let signed = qty * Decimal::from(side.sign());
        if hit_type.is_aggressive() {
            self.net_pos_agg += signed;
            self.counters.cross_count += 1;
        } else {
            self.net_pos_pass += signed;
        }
    }

    /// Queue-position update delegated to the order at `price`/`side`
    /// (§4.3.3); no-op if no order rests there.
    pub fn apply_queue_event(&mut self, price: Decimal, side: Side, event: QueueEvent) {
        if let Some(id) = self.orders.get_by_price(price, side).map(|o| o.order_id) {
            if let Some(o) = self.orders.get_by_id_mut(id) {
                o.apply_queue_event(event);
            }
        }
    }

    /// §4.3.4 mid-stream mark-to-counter-side P&L.
    pub fn mark_to_market(&mut self, bid: Decimal, ask: Decimal, price_multiplier: Decimal) {
        self.pnl.unrealized = if self.net_pos > Decimal::ZERO {
            self.net_pos * (bid - self.buy_avg_price) * price_multiplier
        } else if self.net_pos < Decimal::ZERO {
            self.net_pos.abs() * (self.sell_avg_price - ask) * price_multiplier
        } else {
            Decimal::ZERO
        };
        self.pnl.net = self.pnl.realized + self.pnl.unrealized;
        if self.pnl.net > self.pnl.max {
            self.pnl.max = self.pnl.net;
        }
        self.pnl.drawdown = self.pnl.max - self.pnl.net;
    }

    /// §4.6.5 `pending`: signed open qty of CROSS/MATCH orders.
    pub fn signed_pending_aggressive_qty(&self) -> Decimal {
        // OrderPriceMap's i64 accumulator is sufficient for order
        // quantities; convert once at the book boundary where Decimal
        // accounting is authoritative.
        Decimal::from(self.orders.signed_pending_aggressive_qty())
    }

    /// §4.6.5: record one more outstanding aggressive hedge on `side`,
    /// incrementing the counter guard 1 checks against.
    pub fn record_aggressive_order(&mut self, side: Side) {
        match side {
            Side::Buy => self.buy_agg_order += 1,
            Side::Sell => self.sell_agg_order += 1,
        }
    }

    /// §4.6.5: zero both aggressive-order counters (exposure cleared or
    /// direction flipped).
    pub fn reset_aggressive_orders(&mut self) {
        self.sell_agg_order = 0;
        self.buy_agg_order = 0;
    }

    /// §4.6.6 `Reset()`: snapshot today's pass position into yesterday,
    /// zero day counters, clear order maps and P&L. Idempotent: applying
    /// twice yields the same state (§8).
    pub fn reset_day(&mut self) {
        self.net_pos_pass_ytd = self.net_pos_pass_ytd + (self.net_pos - self.net_pos_pass_ytd);
        self.counters = BookCounters::default();
        self.orders = OrderPriceMap::new();
        self.pnl = BookPnl::default();
        self.sell_agg_order = 0;
        self.buy_agg_order = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OrderType;
    use rust_decimal_macros::dec;

    fn standard_order(id: u128, side: Side, price: Decimal, qty: u64) -> OrderStats {
        let mut o = OrderStats::new(OrderId::new(id), side, price, qty, OrderType::Limit, HitType::Standard);
        o.active = true;
        o
    }

    fn aggressive_order(id: u128, side: Side, price: Decimal, qty: u64) -> OrderStats {
        let mut o = OrderStats::new(OrderId::new(id), side, price, qty, OrderType::Limit, HitType::Cross);
        o.active = true;
        o
    }

    #[test]
    fn buy_fill_opens_long_when_flat() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Buy, dec!(100.0), 10)).unwrap();
        book.apply_fill(OrderId::new(1), 10, dec!(100.0)).unwrap();
        assert_eq!(book.net_pos, dec!(10));
        assert_eq!(book.buy_qty, dec!(10));
        assert_eq!(book.buy_avg_price, dec!(100.0));
        assert_eq!(book.net_pos, book.buy_qty - book.sell_qty);
    }

    #[test]
    fn buy_fill_closes_short_before_opening_long() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Sell, dec!(100.0), 10)).unwrap();
        book.apply_fill(OrderId::new(1), 10, dec!(100.0)).unwrap();
        assert_eq!(book.net_pos, dec!(-10));

        book.place_order(standard_order(2, Side::Buy, dec!(101.0), 15)).unwrap();
        book.apply_fill(OrderId::new(2), 15, dec!(101.0)).unwrap();
        // closes 10 short, opens 5 long
        assert_eq!(book.net_pos, dec!(5));
        assert_eq!(book.sell_qty, Decimal::ZERO);
        assert_eq!(book.sell_avg_price, Decimal::ZERO);
        assert_eq!(book.buy_qty, dec!(5));
        assert_eq!(book.net_pos, book.buy_qty - book.sell_qty);
    }

    #[test]
    fn fill_classifies_passive_vs_aggressive() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Buy, dec!(100.0), 10)).unwrap();
        book.apply_fill(OrderId::new(1), 10, dec!(100.0)).unwrap();
        assert_eq!(book.net_pos_pass, dec!(10));
        assert_eq!(book.net_pos_agg, Decimal::ZERO);

        book.place_order(aggressive_order(2, Side::Sell, dec!(99.0), 10)).unwrap();
        book.apply_fill(OrderId::new(2), 10, dec!(99.0)).unwrap();
        assert_eq!(book.net_pos_agg, dec!(-10));
        // split invariant: netPos = netPosPass + netPosAgg (otherFlows = 0)
        assert_eq!(book.net_pos, book.net_pos_pass + book.net_pos_agg);
    }

    #[test]
    fn fill_exceeding_open_qty_is_rejected() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Buy, dec!(100.0), 10)).unwrap();
        let err = book.apply_fill(OrderId::new(1), 11, dec!(100.0)).unwrap_err();
        assert!(matches!(err, FillError::ExceedsRemaining { .. }));
    }

    #[test]
    fn unknown_order_fill_is_reported_not_panicked() {
        let mut book = PerLegBook::new();
        let err = book.apply_fill(OrderId::new(999), 1, dec!(100.0)).unwrap_err();
        assert!(matches!(err, FillError::UnknownOrder { .. }));
    }

    #[test]
    fn terminal_fill_removes_order_from_maps() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Buy, dec!(100.0), 10)).unwrap();
        book.apply_fill(OrderId::new(1), 10, dec!(100.0)).unwrap();
        assert!(book.orders.get_by_id(OrderId::new(1)).is_none());
    }

    #[test]
    fn partial_fill_keeps_order_active_and_open() {
        let mut book = PerLegBook::new();
        book.place_order(standard_order(1, Side::Buy, dec!(100.0), 10)).unwrap();
        book.apply_fill(OrderId::new(1), 4, dec!(100.0)).unwrap();
        let o = book.orders.get_by_id(OrderId::new(1)).unwrap();
        assert_eq!(o.open_qty, 6);
        assert_eq!(o.filled_qty, 4);
        assert_eq!(o.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn mark_to_market_long_position() {
        let mut book = PerLegBook::new();
        book.net_pos = dec!(10);
        book.buy_avg_price = dec!(100.0);
        book.mark_to_market(dec!(102.0), dec!(102.5), dec!(1));
        assert_eq!(book.pnl.unrealized, dec!(20.0));
        assert_eq!(book.pnl.net, dec!(20.0));
        assert_eq!(book.pnl.max, dec!(20.0));
        assert_eq!(book.pnl.drawdown, Decimal::ZERO);
    }

    #[test]
    fn mark_to_market_tracks_drawdown_from_peak() {
        let mut book = PerLegBook::new();
        book.net_pos = dec!(10);
        book.buy_avg_price = dec!(100.0);
        book.mark_to_market(dec!(110.0), dec!(110.5), dec!(1));
        assert_eq!(book.pnl.max, dec!(100.0));
        book.mark_to_market(dec!(105.0), dec!(105.5), dec!(1));
        assert_eq!(book.pnl.net, dec!(50.0));
        assert_eq!(book.pnl.drawdown, dec!(50.0));
    }

    #[test]
    fn reset_day_is_idempotent() {
        let mut book = PerLegBook::new();
        book.net_pos = dec!(70);
        book.net_pos_pass = dec!(70);
        book.reset_day();
        let after_first = book.net_pos_pass_ytd;
        book.reset_day();
        assert_eq!(book.net_pos_pass_ytd, after_first);
    }

    #[test]
    fn cancel_reject_records_diagnostics_and_leaves_order_in_map() {
        let mut book = PerLegBook::new();
        let mut order = standard_order(1, Side::Buy, dec!(100.0), 10);
        order.cancel_requested = true;
        book.place_order(order).unwrap();
        book.reject_cancel(OrderId::new(1), 42);
        assert_eq!(book.counters.last_cancel_reject_order_id, Some(1));
        assert_eq!(book.counters.last_cancel_reject_time_ns, 42);
        let o = book.orders.get_by_id(OrderId::new(1)).unwrap();
        assert!(!o.cancel_requested);
    }
}
