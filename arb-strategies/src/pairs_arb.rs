//! PairsArbStrategy (C6, §4.6): the two-leg mean-reversion pairs-arbitrage
//! strategy at the center of this runtime. Composes two [`PerLegBook`]s
//! (C3), one [`SpreadAnalyzer`] (C4), one [`ThresholdSet`] (C1), and a
//! [`ControlState`] (C5) behind the [`Strategy`] trait the engine dispatches
//! through (§9).

use crate::params::PairsArbParams;
use arb_core::config::StrategyConfig;
use arb_core::core::errors::EngineError;
use arb_core::core::types::{HitType, OrderId, OrderType, Side};
use arb_core::domain::signal::{Instrument, OrderUpdateStatus};
use arb_core::domain::spread::decimal_to_f64;
use arb_core::feed::shared_value::SharedValueStore;
use arb_core::prelude::*;
use arb_core::utils::metrics::MetricsCollector;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which leg an event or order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    First,
    Second,
}

const NS_PER_MS: u64 = 1_000_000;
const NS_PER_DAY: u64 = 86_400 * 1_000_000_000;

/// C6. Two legs, one spread, one set of dynamic thresholds.
pub struct PairsArbStrategy {
    id: StrategyId,
    symbols: Vec<String>,
    params: PairsArbParams,
    thresholds: ThresholdSet,
    max_position_size: Decimal,

    leg_first: PerLegBook,
    leg_second: PerLegBook,
    instrument_first: Instrument,
    instrument_second: Instrument,
    tick_first: Option<MarketTick>,
    tick_second: Option<MarketTick>,

    spread: SpreadAnalyzer,
    control: ControlState,
    pending: Vec<TradingSignal>,

    shared_value: Option<Arc<dyn SharedValueStore>>,
    metrics: Option<Arc<MetricsCollector>>,

    last_trade_time_ns: u64,
    current_day_bucket: u64,
    reject_count: u64,

    // §4.6.5 aggressive hedge-chase state.
    aggressive_target_leg2: Decimal,
    aggressive_retry_count: u32,
    aggressive_fail_count: u32,
    last_aggressive_attempt_ns: u64,
    aggressive_direction: Option<Side>,
}

impl PairsArbStrategy {
    /// Build from a §6 strategy config document. `config.symbols` must list
    /// exactly `[legFirst, legSecond]`.
    pub fn new(
        config: &StrategyConfig,
        shared_value: Option<Arc<dyn SharedValueStore>>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Result<Self, EngineError> {
        if config.symbols.len() != 2 {
            return Err(EngineError::config(format!(
                "strategy {}: pairs_arb requires exactly 2 symbols, got {}",
                config.strategy_id,
                config.symbols.len()
            )));
        }
        let params: PairsArbParams = config.parameters_as()?;
        params.validate().map_err(EngineError::config)?;

        let thresholds = ThresholdSet {
            begin_place: Decimal::try_from(params.begin_zscore).unwrap_or_default(),
            long_place: Decimal::try_from(params.long_zscore).unwrap_or_default(),
            short_place: Decimal::try_from(params.short_zscore).unwrap_or_default(),
            begin_remove: Decimal::try_from(params.begin_zscore).unwrap_or_default(),
            long_remove: Decimal::try_from(params.long_zscore).unwrap_or_default(),
            short_remove: Decimal::try_from(params.short_zscore).unwrap_or_default(),
            use_dynamic_threshold: params.use_dynamic_threshold,
            static_entry: Decimal::try_from(params.entry_zscore).unwrap_or_default(),
            static_exit: Decimal::try_from(params.exit_zscore).unwrap_or_default(),
        };

        let spread_type = match params.spread_type.as_str() {
            "ratio" => arb_core::domain::spread::SpreadType::Ratio,
            "log" => arb_core::domain::spread::SpreadType::Log,
            _ => arb_core::domain::spread::SpreadType::Difference,
        };

        Ok(Self {
            id: StrategyId(config.strategy_id),
            symbols: config.symbols.clone(),
            instrument_first: Instrument::new(
                config.symbols[0].clone(),
                config.exchanges.first().cloned().unwrap_or_default(),
                Decimal::try_from(params.tick_size_1).unwrap_or(Decimal::new(1, 1)),
                1,
                Decimal::ONE,
            ),
            instrument_second: Instrument::new(
                config.symbols[1].clone(),
                config.exchanges.get(1).cloned().unwrap_or_default(),
                Decimal::try_from(params.tick_size_2).unwrap_or(Decimal::new(1, 1)),
                1,
                Decimal::ONE,
            ),
            max_position_size: config.max_position_size,
            spread: SpreadAnalyzer::new(spread_type, params.lookback_period.max(1) * 4, params.alpha),
            thresholds,
            params,
            leg_first: PerLegBook::new(),
            leg_second: PerLegBook::new(),
            tick_first: None,
            tick_second: None,
            control: ControlState::new(),
            pending: Vec::new(),
            shared_value,
            metrics,
            last_trade_time_ns: 0,
            current_day_bucket: 0,
            reject_count: 0,
            aggressive_target_leg2: Decimal::ZERO,
            aggressive_retry_count: 0,
            aggressive_fail_count: 0,
            last_aggressive_attempt_ns: 0,
            aggressive_direction: None,
        })
    }

    fn leg_of(&self, symbol: &str) -> Option<Leg> {
        if symbol == self.symbols[0] {
            Some(Leg::First)
        } else if symbol == self.symbols[1] {
            Some(Leg::Second)
        } else {
            None
        }
    }

    fn book(&self, leg: Leg) -> &PerLegBook {
        match leg {
            Leg::First => &self.leg_first,
            Leg::Second => &self.leg_second,
        }
    }

    fn book_mut(&mut self, leg: Leg) -> &mut PerLegBook {
        match leg {
            Leg::First => &mut self.leg_first,
            Leg::Second => &mut self.leg_second,
        }
    }

    fn instrument(&self, leg: Leg) -> &Instrument {
        match leg {
            Leg::First => &self.instrument_first,
            Leg::Second => &self.instrument_second,
        }
    }

    fn tvar_key(&self) -> String {
        self.params.tvar_key.replace("{id}", &self.id.0.to_string())
    }

    fn tcache_key(&self, leg: Leg) -> String {
        let base = self.params.tcache_key.replace("{id}", &self.id.0.to_string());
        match leg {
            Leg::First => format!("{base}_leg1_pos"),
            Leg::Second => format!("{base}_leg2_pos"),
        }
    }

    fn t_value(&self) -> f64 {
        self.shared_value
            .as_ref()
            .map(|store| store.get_tvalue(&self.tvar_key()))
            .unwrap_or(0.0)
    }

    fn publish_position_cache(&self) {
        if let Some(store) = &self.shared_value {
            store.set_tcache(&self.tcache_key(Leg::First), decimal_to_f64(self.leg_first.net_pos));
            store.set_tcache(&self.tcache_key(Leg::Second), decimal_to_f64(self.leg_second.net_pos));
        }
    }

    /// §4.6.1: mid/last price used as this leg's input to the spread.
    fn leg_price(tick: &MarketTick) -> f64 {
        decimal_to_f64(tick.mid().unwrap_or(tick.last_price))
    }

    fn day_bucket(now_ns: u64) -> u64 {
        now_ns / NS_PER_DAY
    }

    /// Runs the full per-tick pipeline once both legs have a fresh tick:
    /// update the shared spread, recompute dynamic thresholds, then run the
    /// §4.6.3 entry/exit policy and §4.6.4 multi-level quoting.
    fn on_paired_tick(&mut self) {
        let (t1, t2) = match (&self.tick_first, &self.tick_second) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return,
        };

        if let Some(bid) = t1.best_bid() {
            if let Some(ask) = t1.best_ask() {
                self.leg_first.mark_to_market(bid, ask, self.instrument_first.price_multiplier);
            }
        }
        if let Some(bid) = t2.best_bid() {
            if let Some(ask) = t2.best_ask() {
                self.leg_second
                    .mark_to_market(bid, ask, self.instrument_second.price_multiplier);
            }
        }

        self.spread
            .update(Self::leg_price(&t1), Self::leg_price(&t2), self.params.lookback_period.max(1));
        self.publish_position_cache();

        if !self.spread.is_ready(self.params.lookback_period) {
            return;
        }
        if self.spread.correlation.abs() < self.params.min_correlation {
            debug!(strategy_id = %self.id, correlation = self.spread.correlation, "pairs_arb: correlation below min, skipping signal evaluation");
            return;
        }

        let z = match self.spread.adjusted_zscore(self.t_value()) {
            Some(z) => z,
            None => return,
        };

        self.drive_exit(z, &t1, &t2);
        self.drive_entry(z, &t1, &t2);
        if self.params.enable_multi_level {
            self.drive_multi_level(z, &t1, &t2);
        }
    }

    /// §4.6.2: dynamic entry/exit thresholds recomputed every tick from
    /// `legFirst.netPos` vs `maxPositionSize`.
    fn entry_pair(&self) -> (f64, f64) {
        let p = self.thresholds.entry_thresholds(self.leg_first.net_pos, self.max_position_size);
        (decimal_to_f64(p.bid), decimal_to_f64(p.ask))
    }

    fn exit_pair(&self) -> (f64, f64) {
        let p = self.thresholds.exit_thresholds(self.leg_first.net_pos, self.max_position_size);
        (decimal_to_f64(p.bid), decimal_to_f64(p.ask))
    }

    /// §4.6.3 single-level entry: `z <= -buyThreshold` opens BUY leg-first /
    /// SELL leg-second; `z >= sellThreshold` opens the opposite. Both sides
    /// are gated by `canSendNewOrders`, the correlation floor, the trade
    /// interval, and the position cap.
    fn drive_entry(&mut self, z: f64, t1: &MarketTick, t2: &MarketTick) {
        if !self.control.can_send_new_orders() {
            return;
        }
        let now = t1.timestamp_ns.max(t2.timestamp_ns);
        if now.saturating_sub(self.last_trade_time_ns) < self.params.trade_interval_ms * NS_PER_MS {
            return;
        }
        let (buy_threshold, sell_threshold) = self.entry_pair();
        let order_size = self.params.order_size;
        let leg2_qty = ((order_size as f64) * self.spread.hedge_ratio).round().max(1.0) as u64;

        if z <= -buy_threshold {
            let room = self.max_position_size - self.leg_first.net_pos;
            if room >= Decimal::from(order_size) {
                self.quote_pair(Side::Buy, order_size, t1, t2, leg2_qty, 0);
                self.last_trade_time_ns = now;
            }
        } else if z >= sell_threshold {
            let room = self.max_position_size + self.leg_first.net_pos;
            if room >= Decimal::from(order_size) {
                self.quote_pair(Side::Sell, order_size, t1, t2, leg2_qty, 0);
                self.last_trade_time_ns = now;
            }
        }
    }

    /// §4.6.3 single-level exit: close both legs once the z-score has
    /// reverted back inside the (smaller) exit band.
    fn drive_exit(&mut self, z: f64, t1: &MarketTick, t2: &MarketTick) {
        if self.leg_first.is_flat() {
            return;
        }
        let (exit_bid, exit_ask) = self.exit_pair();
        let should_exit = if self.leg_first.net_pos > Decimal::ZERO {
            z >= -exit_bid
        } else {
            z <= exit_ask
        };
        if !should_exit {
            return;
        }
        self.close_both_legs(t1, t2, "mean_reversion_exit");
    }

    fn close_both_legs(&mut self, t1: &MarketTick, t2: &MarketTick, reason: &str) {
        if let (Some(qty1), Some(bid1), Some(ask1)) =
            (self.leg_first.net_pos.abs().to_u64(), t1.best_bid(), t1.best_ask())
        {
            if qty1 > 0 {
                let side = if self.leg_first.net_pos > Decimal::ZERO { Side::Sell } else { Side::Buy };
                let price = self.instrument_first.round_to_tick(if side == Side::Sell { bid1 } else { ask1 });
                self.pending.push(
                    TradingSignal::passive(self.id.0, self.symbols[0].clone(), side, price, qty1)
                        .with_reason(reason),
                );
            }
        }
        if let (Some(qty2), Some(bid2), Some(ask2)) =
            (self.leg_second.net_pos.abs().to_u64(), t2.best_bid(), t2.best_ask())
        {
            if qty2 > 0 {
                let side = if self.leg_second.net_pos > Decimal::ZERO { Side::Sell } else { Side::Buy };
                let price = self.instrument_second.round_to_tick(if side == Side::Sell { bid2 } else { ask2 });
                self.pending.push(
                    TradingSignal::passive(self.id.0, self.symbols[1].clone(), side, price, qty2)
                        .with_reason(reason),
                );
            }
        }
    }

    /// Quote both legs at level `level`: leg-first joins the book on the
    /// entry side, leg-second quotes the opposite side sized by the current
    /// hedge ratio.
    fn quote_pair(&mut self, leg1_side: Side, leg1_qty: u64, t1: &MarketTick, t2: &MarketTick, leg2_qty: u64, level: u32) {
        let leg1_price = match leg1_side {
            Side::Buy => t1.best_bid(),
            Side::Sell => t1.best_ask(),
        };
        let leg2_side = leg1_side.opposite();
        let leg2_price = match leg2_side {
            Side::Buy => t2.best_bid(),
            Side::Sell => t2.best_ask(),
        };
        let (Some(p1), Some(p2)) = (leg1_price, leg2_price) else { return };
        let p1 = self.instrument_first.round_to_tick(p1);
        let p2 = self.instrument_second.round_to_tick(p2);

        if self.leg_first.orders.has_order_at(p1, leg1_side) || self.leg_second.orders.has_order_at(p2, leg2_side) {
            return;
        }

        if self.metrics.is_some() {
            self.metrics.as_ref().unwrap().record_signal(false);
        }
        self.pending.push(
            TradingSignal::passive(self.id.0, self.symbols[0].clone(), leg1_side, p1, leg1_qty)
                .with_quote_level(level),
        );
        self.pending.push(
            TradingSignal::passive(self.id.0, self.symbols[1].clone(), leg2_side, p2, leg2_qty)
                .with_quote_level(level),
        );
    }

    /// §4.6.4 multi-level passive quoting: for each additional depth level,
    /// recompute an effective z-score pairing leg-first's level price
    /// against leg-second's top price, and quote that level if it still
    /// clears the entry threshold. Includes the invisible-book price
    /// optimization: if the resting level-1+ order has grown thin relative
    /// to the queue ahead of it, step it one tick toward the book.
    fn drive_multi_level(&mut self, _top_z: f64, t1: &MarketTick, t2: &MarketTick) {
        if !self.control.can_send_new_orders() {
            return;
        }
        let (buy_threshold, sell_threshold) = self.entry_pair();
        let levels = self.params.max_quote_level.min(t1.bid_prices.len() as u32).min(t1.ask_prices.len() as u32);
        let leg2_top = Self::leg_price(t2);

        for level in 1..levels {
            let idx = level as usize;
            let level_size = self
                .params
                .quote_level_sizes
                .get(idx)
                .copied()
                .unwrap_or(self.params.order_size);
            let leg2_qty = ((level_size as f64) * self.spread.hedge_ratio).round().max(1.0) as u64;

            if let Some(&bid_n) = t1.bid_prices.get(idx) {
                let z = self.spread.spread_type_z(decimal_to_f64(bid_n), leg2_top);
                if z <= -buy_threshold {
                    self.quote_pair(Side::Buy, level_size, t1, t2, leg2_qty, level);
                }
            }
            if let Some(&ask_n) = t1.ask_prices.get(idx) {
                let z = self.spread.spread_type_z(decimal_to_f64(ask_n), leg2_top);
                if z >= sell_threshold {
                    self.quote_pair(Side::Sell, level_size, t1, t2, leg2_qty, level);
                }
            }
        }

        self.optimize_resting_prices(t1);
    }

    /// Invisible-book optimization: a resting level order whose queue ahead
    /// has thinned past its own size is stepped one tick toward the touch,
    /// provided the jump from the inside price still clears `priceOptimizeGap`
    /// ticks and the move would not cross the level-0 price.
    fn optimize_resting_prices(&mut self, t1: &MarketTick) {
        if !self.params.enable_price_optimize {
            return;
        }
        let tick = self.instrument_first.tick_size();
        let gap = tick * Decimal::from(self.params.price_optimize_gap);
        let Some(best_bid) = t1.best_bid() else { return };
        let Some(best_ask) = t1.best_ask() else { return };

        let resting: Vec<(Decimal, Side)> = self
            .leg_first
            .orders
            .snapshot_active()
            .into_iter()
            .map(|o| (o.price, o.side))
            .collect();

        for (price, side) in resting {
            let Some(order) = self.leg_first.orders.get_by_price(price, side) else { continue };
            if order.quant_ahead == 0 || order.quant_ahead > self.instrument_first.lot_size {
                continue;
            }
            let id = order.order_id;
            let next_price = match side {
                Side::Buy if best_bid - price >= gap => price + tick,
                Side::Sell if price - best_ask >= gap => price - tick,
                _ => continue,
            };
            if self.leg_first.orders.has_order_at(next_price, side) {
                continue;
            }
            if let Err(err) = self.leg_first.orders.reprice(id, next_price, order.qty) {
                warn!(strategy_id = %self.id, %err, "pairs_arb: invisible-book reprice failed");
            }
        }
    }

    /// §4.6.5 aggressive hedge-chase: called from the timer tick. Drives
    /// the remaining signed hedge exposure on leg-second down to zero via
    /// IOC orders that walk the book one `aggressiveSlopTicks` step further
    /// on each retry, subject to `aggressiveMaxRetry`/`supportingOrders`.
    fn drive_aggressive_hedge(&mut self, now_ns: u64) {
        if !self.params.aggressive_enabled {
            return;
        }
        let Some(tick) = self.tick_second.clone() else { return };

        let pending = self.leg_second.signed_pending_aggressive_qty();
        let remaining = self.aggressive_target_leg2 - pending;
        let Some(qty) = remaining.abs().round().to_u64() else { return };
        if qty == 0 {
            // §4.6.5 `total = 0`: reset the chase and side counters.
            self.aggressive_retry_count = 0;
            self.aggressive_direction = None;
            self.leg_second.reset_aggressive_orders();
            return;
        }

        let side = if remaining > Decimal::ZERO { Side::Buy } else { Side::Sell };

        // §4.6.5 guard 1: supporting-orders cap, gated on the side counter
        // the spec names (`sellAggOrder`/`buyAggOrder`), not a live order
        // snapshot. 0 means unlimited, not "no outstanding orders allowed".
        if self.params.supporting_orders > 0 {
            let side_count = match side {
                Side::Buy => self.leg_second.buy_agg_order,
                Side::Sell => self.leg_second.sell_agg_order,
            };
            if side_count as u64 > self.params.supporting_orders {
                debug!(strategy_id = %self.id, side_count, cap = self.params.supporting_orders, "pairs_arb: supporting-orders cap reached, deferring aggressive retry");
                return;
            }
        }

        // §4.6.5 guard 2: a direction flip resets the chase and zeroes the
        // new side's counter, and its interval check is skipped for this
        // tick so the first chase in the new direction fires immediately.
        let flipped = self.aggressive_direction.is_some_and(|d| d != side);
        if flipped {
            self.aggressive_retry_count = 0;
            match side {
                Side::Buy => self.leg_second.buy_agg_order = 0,
                Side::Sell => self.leg_second.sell_agg_order = 0,
            }
        }

        // §4.6.5 guard 3: interval, skipped on a direction flip.
        if !flipped && now_ns.saturating_sub(self.last_aggressive_attempt_ns) < self.params.aggressive_interval_ms * NS_PER_MS {
            return;
        }

        // §4.6.5 guard 4: retry cap.
        if self.aggressive_retry_count >= self.params.aggressive_max_retry {
            self.aggressive_fail_count += 1;
            warn!(
                strategy_id = %self.id,
                fail_count = self.aggressive_fail_count,
                threshold = self.params.aggressive_fail_threshold,
                "pairs_arb: aggressive hedge retry cap reached"
            );
            if self.aggressive_fail_count >= self.params.aggressive_fail_threshold {
                self.trigger_exit(FlattenReason::AggressiveRetryExhausted);
            }
            return;
        }

        // §4.6.5 price progression: retries 1-3 step one tick per retry,
        // retry 4+ jumps straight to the configured SLOP tick count.
        let ticks = if self.aggressive_retry_count + 1 <= 3 {
            self.aggressive_retry_count as u64 + 1
        } else {
            self.params.aggressive_slop_ticks
        };
        let slop = self.instrument_second.tick_size() * Decimal::from(ticks);
        let base = match side {
            Side::Buy => tick.best_ask().unwrap_or(tick.last_price),
            Side::Sell => tick.best_bid().unwrap_or(tick.last_price),
        };
        let price = self.instrument_second.round_to_tick(match side {
            Side::Buy => base + slop,
            Side::Sell => base - slop,
        });

        if let Some(metrics) = &self.metrics {
            metrics.record_aggressive_retry();
            metrics.record_signal(true);
        }
        self.pending
            .push(TradingSignal::aggressive(self.id.0, self.symbols[1].clone(), side, price, qty));
        self.leg_second.record_aggressive_order(side);
        self.aggressive_direction = Some(side);
        self.aggressive_retry_count += 1;
        self.last_aggressive_attempt_ns = now_ns;
    }

    fn ensure_tracked(&mut self, leg: Leg, update: &arb_core::domain::signal::OrderUpdate) {
        let id = OrderId::from(update.order_id);
        let hit_type = if update.is_aggressive() { HitType::Cross } else { HitType::Standard };
        let book = self.book_mut(leg);
        if book.orders.get_by_id(id).is_none() {
            let mut order = OrderStats::new(id, update.side, update.price, update.quantity, OrderType::Limit, hit_type);
            order.active = true;
            if book.place_order(order).is_ok() {
                book.confirm_new(id);
            }
        }
    }

    fn handle_fill(&mut self, leg: Leg, update: &arb_core::domain::signal::OrderUpdate) {
        self.ensure_tracked(leg, update);
        let id = OrderId::from(update.order_id);
        let book = self.book_mut(leg);
        let already_filled = book.orders.get_by_id(id).map(|o| o.filled_qty).unwrap_or(0);
        let delta = update.filled_qty.saturating_sub(already_filled);
        if delta == 0 {
            return;
        }
        if let Err(err) = book.apply_fill(id, delta, update.avg_price) {
            warn!(strategy_id = %self.id, %err, "pairs_arb: fill application failed");
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_fill(update.is_aggressive());
        }
        self.publish_position_cache();

        let signed_delta = Decimal::from(delta) * Decimal::from(update.side.sign());
        match leg {
            Leg::First => {
                if !update.is_aggressive() {
                    self.aggressive_target_leg2 -= signed_delta * Decimal::from_f64_retain(self.spread.hedge_ratio).unwrap_or(Decimal::ONE);
                }
            }
            Leg::Second => {
                self.aggressive_target_leg2 -= signed_delta;
                if update.is_aggressive() {
                    self.aggressive_retry_count = 0;
                    self.aggressive_fail_count = 0;
                }
            }
        }
    }

    fn handle_rejected_or_canceled(&mut self, leg: Leg, update: &arb_core::domain::signal::OrderUpdate) {
        let id = OrderId::from(update.order_id);
        self.reject_count += 1;
        if let Some(m) = &self.metrics {
            m.record_reject();
        }
        self.book_mut(leg).orders.remove_by_id(id);
        if leg == Leg::Second && update.is_aggressive() {
            self.aggressive_fail_count += 1;
            if self.aggressive_fail_count >= self.params.aggressive_fail_threshold {
                warn!(strategy_id = %self.id, "pairs_arb: aggressive hedge failure streak exceeded threshold");
                self.trigger_flatten(FlattenReason::AggressiveRetryExhausted, true);
            }
        }
    }
}

impl Strategy for PairsArbStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// §4.6.6 `Reset()`: snapshot today's pass position, zero day counters,
    /// carry the spread's EMA mean and rolling history forward.
    fn reset(&mut self) {
        self.leg_first.reset_day();
        self.leg_second.reset_day();
        self.aggressive_target_leg2 = Decimal::ZERO;
        self.aggressive_retry_count = 0;
        self.aggressive_fail_count = 0;
        self.aggressive_direction = None;
        info!(strategy_id = %self.id, "pairs_arb: day boundary reset");
    }

    fn on_market_data(&mut self, tick: &MarketTick) {
        match self.leg_of(&tick.symbol) {
            Some(Leg::First) => self.tick_first = Some(tick.clone()),
            Some(Leg::Second) => self.tick_second = Some(tick.clone()),
            None => return,
        }
        self.on_paired_tick();
    }

    fn on_auction_data(&mut self, tick: &MarketTick) {
        // Auction ticks update reference prices only; no orders during the
        // pre-open auction window.
        match self.leg_of(&tick.symbol) {
            Some(Leg::First) => self.tick_first = Some(tick.clone()),
            Some(Leg::Second) => self.tick_second = Some(tick.clone()),
            None => {}
        }
    }

    fn on_order_update(&mut self, update: &arb_core::domain::signal::OrderUpdate) {
        if update.strategy_id != self.id.0 {
            return;
        }
        let Some(leg) = self.leg_of(&update.symbol) else { return };
        match update.status {
            OrderUpdateStatus::Accepted | OrderUpdateStatus::Submitted => self.ensure_tracked(leg, update),
            OrderUpdateStatus::PartiallyFilled | OrderUpdateStatus::Filled => self.handle_fill(leg, update),
            OrderUpdateStatus::Rejected | OrderUpdateStatus::Canceled => {
                self.handle_rejected_or_canceled(leg, update)
            }
            OrderUpdateStatus::Canceling => {}
        }
    }

    fn on_timer(&mut self, now_ns: u64) {
        let bucket = Self::day_bucket(now_ns);
        if self.current_day_bucket != 0 && bucket != self.current_day_bucket {
            self.reset();
        }
        self.current_day_bucket = bucket;
        self.drive_aggressive_hedge(now_ns);
    }

    fn drain_signals(&mut self) -> Vec<TradingSignal> {
        std::mem::take(&mut self.pending)
    }

    fn can_send_order(&self) -> bool {
        self.control.can_send_new_orders()
    }

    fn check_squareoff(&self) -> Option<FlattenReason> {
        if self.leg_first.net_pos.abs() > self.max_position_size {
            Some(FlattenReason::DeltaLimit)
        } else {
            None
        }
    }

    fn handle_square_on(&mut self) -> bool {
        self.control.apply(
            arb_core::domain::control::ControlEvent::TryRecover,
            self.is_position_flat(),
            self.has_pending_signals(),
        )
    }

    fn handle_squareoff(&mut self, _current_price: Decimal) -> Vec<TradingSignal> {
        if let (Some(t1), Some(t2)) = (self.tick_first.clone(), self.tick_second.clone()) {
            self.close_both_legs(&t1, &t2, "flatten");
        }
        std::mem::take(&mut self.pending)
    }

    fn set_thresholds(&mut self, thresholds: ThresholdSet) {
        self.thresholds = thresholds;
    }

    fn control_state(&self) -> &ControlState {
        &self.control
    }

    fn trigger_flatten(&mut self, reason: FlattenReason, aggressive: bool) {
        self.control.apply(
            arb_core::domain::control::ControlEvent::TriggerFlatten { reason, aggressive },
            self.is_position_flat(),
            self.has_pending_signals(),
        );
        if let Some(m) = &self.metrics {
            m.record_flatten(&reason.to_string());
        }
    }

    fn trigger_exit(&mut self, reason: FlattenReason) {
        self.control.apply(
            arb_core::domain::control::ControlEvent::TriggerExit { reason },
            self.is_position_flat(),
            self.has_pending_signals(),
        );
        if let Some(m) = &self.metrics {
            m.record_exit(&reason.to_string());
        }
    }

    fn is_position_flat(&self) -> bool {
        self.leg_first.is_flat() && self.leg_second.is_flat()
    }

    fn has_pending_signals(&self) -> bool {
        !self.pending.is_empty()
    }

    fn risk_snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            realized_pnl: self.leg_first.pnl.realized + self.leg_second.pnl.realized,
            unrealized_pnl: self.leg_first.pnl.unrealized + self.leg_second.pnl.unrealized,
            net_pnl: self.leg_first.pnl.net + self.leg_second.pnl.net,
            drawdown: self.leg_first.pnl.drawdown + self.leg_second.pnl.drawdown,
            reject_count: self.reject_count,
            position: self.leg_first.net_pos,
        }
    }
}

/// Small extension used only by the multi-level quoting path: the z-score
/// of an arbitrary (non-touch) price pair against the analyzer's current
/// mean/std, without mutating its rolling history.
trait LevelZScore {
    fn spread_type_z(&self, price1: f64, price2: f64) -> f64;
}

impl LevelZScore for SpreadAnalyzer {
    fn spread_type_z(&self, price1: f64, price2: f64) -> f64 {
        if self.std <= f64::EPSILON {
            return 0.0;
        }
        let spread = self.spread_type.compute(price1, price2);
        (spread - (self.ema_mean)) / self.std
    }
}
