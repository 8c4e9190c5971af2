//! C2 — OrderStats / OrderPriceMap (§4.2): per-order state dual-indexed by
//! order id and by `(price, side)`.

use crate::core::types::{HitType, OrderId, OrderStatus, OrderType, Side};
use crate::core::EngineError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Per-order state (§3 `OrderStats`).
#[derive(Debug, Clone)]
pub struct OrderStats {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Decimal,
    pub qty: u64,
    pub open_qty: u64,
    pub filled_qty: u64,
    pub avg_fill_price: Decimal,
    pub order_type: OrderType,
    pub hit_type: HitType,
    pub status: OrderStatus,
    pub quant_ahead: u64,
    pub quant_behind: u64,
    pub active: bool,
    pub cancel_requested: bool,
    pub modify_wait: bool,
}

impl OrderStats {
    pub fn new(
        order_id: OrderId,
        side: Side,
        price: Decimal,
        qty: u64,
        order_type: OrderType,
        hit_type: HitType,
    ) -> Self {
        Self {
            order_id,
            side,
            price,
            qty,
            open_qty: qty,
            filled_qty: 0,
            avg_fill_price: Decimal::ZERO,
            order_type,
            hit_type,
            status: OrderStatus::New,
            quant_ahead: 0,
            quant_behind: 0,
            active: false,
            cancel_requested: false,
            modify_wait: false,
        }
    }

    /// `openQty + filledQty = qty` while not canceled (§3 invariant).
    pub fn invariant_holds(&self) -> bool {
        self.status == OrderStatus::Cancelled || self.open_qty + self.filled_qty == self.qty
    }

    /// Initialize queue position on confirmation (§4.3.3): given total
    /// resting qty `total_at_price` and estimated rank `p in [0,1]`.
    pub fn init_queue_position(&mut self, total_at_price: u64, rank: f64) {
        let rank = rank.clamp(0.0, 1.0);
        let behind_total = total_at_price.saturating_sub(self.open_qty) as f64;
        self.quant_ahead = (behind_total * rank).round() as u64;
        self.quant_behind = (behind_total * (1.0 - rank)).round() as u64;
    }

    /// Queue-position update on a book event at this order's price (§4.3.3).
    pub fn apply_queue_event(&mut self, event: QueueEvent) {
        match event {
            QueueEvent::Trade { traded_qty } => {
                self.quant_ahead = self.quant_ahead.saturating_sub(traded_qty);
            }
            QueueEvent::DeleteOrModify { old_qty, new_qty } => {
                if old_qty > new_qty {
                    let diff = old_qty - new_qty;
                    if diff <= self.quant_ahead && diff > self.quant_behind {
                        self.quant_ahead = self.quant_ahead.saturating_sub(diff);
                    } else if diff > self.quant_ahead && diff <= self.quant_behind {
                        self.quant_behind = self.quant_behind.saturating_sub(diff);
                    } else {
                        let total = self.quant_ahead + self.quant_behind;
                        if total > 0 {
                            let ahead_share =
                                (diff as f64 * self.quant_ahead as f64 / total as f64).round() as u64;
                            let behind_share = diff.saturating_sub(ahead_share);
                            self.quant_ahead = self.quant_ahead.saturating_sub(ahead_share);
                            self.quant_behind = self.quant_behind.saturating_sub(behind_share);
                        }
                    }
                } else {
                    self.quant_behind += new_qty - old_qty;
                }
            }
            QueueEvent::Add { added_qty } => {
                self.quant_behind += added_qty;
            }
        }
    }
}

/// Book events that move queue position (§4.3.3).
#[derive(Debug, Clone, Copy)]
pub enum QueueEvent {
    Trade { traded_qty: u64 },
    DeleteOrModify { old_qty: u64, new_qty: u64 },
    Add { added_qty: u64 },
}

/// Dual-indexed order map: by id, and by `(price, side)`. Guarantees no two
/// active orders from the same strategy sit at the same price on the same
/// side.
#[derive(Debug, Default)]
pub struct OrderPriceMap {
    by_id: HashMap<OrderId, OrderStats>,
    bid_by_price: HashMap<Decimal, OrderId>,
    ask_by_price: HashMap<Decimal, OrderId>,
}

impl OrderPriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn side_map(&self, side: Side) -> &HashMap<Decimal, OrderId> {
        match side {
            Side::Buy => &self.bid_by_price,
            Side::Sell => &self.ask_by_price,
        }
    }

    fn side_map_mut(&mut self, side: Side) -> &mut HashMap<Decimal, OrderId> {
        match side {
            Side::Buy => &mut self.bid_by_price,
            Side::Sell => &mut self.ask_by_price,
        }
    }

    /// Fails if an order already exists at `(price, side)` — a
    /// `PolicyViolation`, not a panic.
    pub fn add(&mut self, order: OrderStats) -> Result<(), EngineError> {
        if self.has_order_at(order.price, order.side) {
            return Err(EngineError::policy_violation(format!(
                "duplicate order at price {} side {:?}",
                order.price, order.side
            )));
        }
        let (id, price, side) = (order.order_id, order.price, order.side);
        self.by_id.insert(id, order);
        self.side_map_mut(side).insert(price, id);
        Ok(())
    }

    pub fn remove_by_id(&mut self, id: OrderId) -> Option<OrderStats> {
        let order = self.by_id.remove(&id)?;
        self.side_map_mut(order.side).remove(&order.price);
        Some(order)
    }

    pub fn get_by_id(&self, id: OrderId) -> Option<&OrderStats> {
        self.by_id.get(&id)
    }

    pub fn get_by_id_mut(&mut self, id: OrderId) -> Option<&mut OrderStats> {
        self.by_id.get_mut(&id)
    }

    pub fn get_by_price(&self, price: Decimal, side: Side) -> Option<&OrderStats> {
        self.side_map(side).get(&price).and_then(|id| self.by_id.get(id))
    }

    pub fn has_order_at(&self, price: Decimal, side: Side) -> bool {
        self.side_map(side).contains_key(&price)
    }

    /// Atomically reindex the price map from old to new price (§4.3.2
    /// ModifyConfirm).
    pub fn reprice(&mut self, id: OrderId, new_price: Decimal, new_qty: u64) -> Result<(), EngineError> {
        let order = self
            .by_id
            .get(&id)
            .ok_or_else(|| EngineError::policy_violation(format!("reprice of unknown order {id}")))?;
        let side = order.side;
        let old_price = order.price;
        if new_price != old_price && self.has_order_at(new_price, side) {
            return Err(EngineError::policy_violation(format!(
                "reprice target price {new_price} already occupied on side {side:?}"
            )));
        }
        self.side_map_mut(side).remove(&old_price);
        self.side_map_mut(side).insert(new_price, id);
        let order = self.by_id.get_mut(&id).unwrap();
        order.price = new_price;
        order.qty = new_qty;
        order.open_qty = new_qty.saturating_sub(order.filled_qty);
        Ok(())
    }

    /// Copy of orders with `active && openQty > 0`.
    pub fn snapshot_active(&self) -> Vec<OrderStats> {
        self.by_id
            .values()
            .filter(|o| o.active && o.open_qty > 0)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Sum of open quantity for orders with a given hit-type classification
    /// on the given side, signed by side — used by the aggressive hedge
    /// protocol's `pending` computation (§4.6.5).
    pub fn signed_pending_aggressive_qty(&self) -> i64 {
        self.by_id
            .values()
            .filter(|o| o.active && o.hit_type.is_aggressive())
            .map(|o| o.open_qty as i64 * o.side.sign())
            .sum()
    }
}
