//! C7 — StrategyEngine (§4.7): multi-tenant dispatch, order-update fan-in,
//! and the timer/risk loop. Hosts many strategy *kinds* behind one
//! registry rather than the single const-generic `Engine<S, E>` a
//! single-strategy deployment would use (§4.7.1), since reads dominate
//! and mutation is add/remove only (§5).

use crate::core::types::{OrderType, Side};
use crate::domain::control::FlattenReason;
use crate::domain::shared_indicators::SharedIndicatorPool;
use crate::domain::signal::{MarketTick, OrderCategory, OrderUpdate, TradingSignal};
use crate::engine::strategy::{Strategy, StrategyId};
use crate::feed::router::{OrderRequest, OrderRouter};
use crate::risk::{RiskDetectors, RiskLimits, RiskVerdict};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-request routing deadline (§6).
pub const DEFAULT_ORDER_TIMEOUT: Duration = Duration::from_millis(50);

type StrategyHandle = Arc<Mutex<dyn Strategy>>;

/// C7. Owns the strategy registry, the shared indicator pool, the order
/// router, and the engine-level risk detectors.
pub struct StrategyEngine {
    strategies: RwLock<HashMap<StrategyId, StrategyHandle>>,
    shared_indicators: Arc<SharedIndicatorPool>,
    router: Arc<dyn OrderRouter>,
    risk: RiskDetectors,
    order_timeout: Duration,
    cancelled: Arc<AtomicBool>,
}

impl StrategyEngine {
    pub fn new(router: Arc<dyn OrderRouter>, risk_limits: RiskLimits, order_timeout: Duration) -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            shared_indicators: Arc::new(SharedIndicatorPool::new()),
            router,
            risk: RiskDetectors::new(risk_limits),
            order_timeout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shared_indicators(&self) -> Arc<SharedIndicatorPool> {
        self.shared_indicators.clone()
    }

    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Mutation-only path (§5): add a strategy to the registry.
    pub fn register_strategy(&self, strategy: StrategyHandle) {
        let id = strategy.lock().id();
        self.strategies.write().insert(id, strategy);
    }

    pub fn unregister_strategy(&self, id: StrategyId) -> Option<StrategyHandle> {
        self.strategies.write().remove(&id)
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.read().len()
    }

    fn strategies_for_symbol(&self, symbol: &str) -> Vec<StrategyHandle> {
        self.strategies
            .read()
            .values()
            .filter(|s| s.lock().symbols().iter().any(|sym| sym == symbol))
            .cloned()
            .collect()
    }

    fn all_strategies(&self) -> Vec<StrategyHandle> {
        self.strategies.read().values().cloned().collect()
    }

    /// §4.7.1 sync path: invoke `onMarketData` inline, drain pending
    /// signals, verify `canSendOrder` per signal before routing.
    ///
    /// `SharedIndicatorPool::update` takes a pair key and two leg prices,
    /// which only a strategy (not a single-symbol `MarketTick`) has both
    /// halves of; strategies update the pool themselves from their own
    /// `on_market_data` when they want peers on the same pair to observe
    /// the computation, rather than the engine doing it generically here.
    pub fn dispatch_market_data(&self, tick: &MarketTick) {
        for handle in self.strategies_for_symbol(&tick.symbol) {
            let mut strategy = handle.lock();
            strategy.on_market_data(tick);
            let signals = strategy.drain_signals();
            let can_send = strategy.can_send_order();
            drop(strategy);
            for signal in signals {
                if !can_send {
                    debug!(symbol = %tick.symbol, "dropping signal: strategy cannot send new orders");
                    continue;
                }
                self.route_signal(signal);
            }
        }
    }

    /// As `dispatch_market_data`, for pre-open auction ticks.
    pub fn dispatch_auction_data(&self, tick: &MarketTick) {
        for handle in self.strategies_for_symbol(&tick.symbol) {
            let mut strategy = handle.lock();
            strategy.on_auction_data(tick);
            let signals = strategy.drain_signals();
            let can_send = strategy.can_send_order();
            drop(strategy);
            for signal in signals {
                if can_send {
                    self.route_signal(signal);
                }
            }
        }
    }

    /// §4.7.2: a single `order.>` subscription fans out to every
    /// registered strategy; each strategy filters by its own
    /// `strategy_id` stamp and ignores updates addressed to others.
    pub fn dispatch_order_update(&self, update: &OrderUpdate) {
        for handle in self.all_strategies() {
            handle.lock().on_order_update(update);
        }
    }

    /// §4.7.3 timer loop: `performStateCheck`, then (if flattening/exiting)
    /// `handleFlatten`, recovery attempts, finally `onTimer`. `prices`
    /// supplies the current reference price per symbol for closing orders.
    pub fn run_timer_tick(&self, now_ns: u64, prices: &HashMap<String, Decimal>) {
        for handle in self.all_strategies() {
            let mut strategy = handle.lock();
            let id = strategy.id();

            let verdict = self.risk.perform_state_check(&strategy.risk_snapshot());
            match verdict {
                RiskVerdict::Ok => {}
                RiskVerdict::Flatten { reason, aggressive } => {
                    info!(strategy_id = %id, %reason, "performStateCheck: triggering flatten");
                    strategy.trigger_flatten(reason, aggressive);
                }
                RiskVerdict::Exit { reason } => {
                    info!(strategy_id = %id, %reason, "performStateCheck: triggering exit");
                    strategy.trigger_exit(reason);
                }
            }

            if let Some(reason) = strategy.check_squareoff() {
                if !strategy.control_state().flatten_mode {
                    info!(strategy_id = %id, %reason, "strategy-reported squareoff condition");
                    strategy.trigger_flatten(reason, false);
                }
            }

            if strategy.control_state().flatten_mode {
                let symbols = strategy.symbols().to_vec();
                let reference_price = symbols
                    .iter()
                    .find_map(|sym| prices.get(sym))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let closing_signals = strategy.handle_squareoff(reference_price);
                drop(strategy);
                for signal in closing_signals {
                    self.route_signal(signal);
                }
                strategy = handle.lock();
            }

            if strategy.handle_square_on() {
                info!(strategy_id = %id, "recovered from flatten, resuming active trading");
            }

            strategy.on_timer(now_ns);
        }
    }

    fn route_signal(&self, signal: TradingSignal) {
        let req = OrderRequest {
            strategy_id: StrategyId(signal.strategy_id),
            symbol: signal.symbol.clone(),
            side: signal.side,
            price: signal.price,
            quantity: signal.quantity,
            order_type: match signal.category {
                OrderCategory::Passive => OrderType::Limit,
                OrderCategory::Aggressive => OrderType::Limit,
            },
        };
        match self.router.send(req, self.order_timeout) {
            Ok(resp) if resp.error_code.is_none() => {
                debug!(order_id = %resp.order_id, symbol = %signal.symbol, "signal routed");
            }
            Ok(resp) => {
                warn!(order_id = %resp.order_id, error = ?resp.error_code, "order router rejected signal");
            }
            Err(err) => {
                warn!(symbol = %signal.symbol, error = %err, "order router transport error; position unchanged");
            }
        }
    }
}

/// Flatten reason carried purely for the timer loop's structured log
/// lines above; avoids importing `FlattenReason`'s `Display` impl twice.
#[allow(dead_code)]
fn _assert_flatten_reason_displays(_: FlattenReason) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control::{ControlEvent, ControlState, RunState};
    use crate::domain::signal::FeedType;
    use crate::engine::strategy::RiskSnapshot;
    use crate::feed::router::InMemoryOrderRouter;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicU32;

    struct StubStrategy {
        id: StrategyId,
        symbols: Vec<String>,
        control: ControlState,
        pending: Vec<TradingSignal>,
        ticks_seen: Arc<AtomicU32>,
        timers_seen: Arc<AtomicU32>,
        risk: RiskSnapshot,
    }

    impl StubStrategy {
        fn new(id: u64, symbol: &str, ticks_seen: Arc<AtomicU32>, timers_seen: Arc<AtomicU32>) -> Self {
            Self {
                id: StrategyId(id),
                symbols: vec![symbol.to_string()],
                control: ControlState::new(),
                pending: Vec::new(),
                ticks_seen,
                timers_seen,
                risk: RiskSnapshot::default(),
            }
        }
    }

    impl Strategy for StubStrategy {
        fn id(&self) -> StrategyId {
            self.id
        }
        fn symbols(&self) -> &[String] {
            &self.symbols
        }
        fn reset(&mut self) {}
        fn on_market_data(&mut self, _tick: &MarketTick) {
            self.ticks_seen.fetch_add(1, Ordering::Relaxed);
            self.pending.push(TradingSignal::passive(
                self.id.0,
                self.symbols[0].clone(),
                Side::Buy,
                dec!(100.0),
                1,
            ));
        }
        fn on_auction_data(&mut self, _tick: &MarketTick) {}
        fn on_order_update(&mut self, _update: &OrderUpdate) {}
        fn on_timer(&mut self, _now_ns: u64) {
            self.timers_seen.fetch_add(1, Ordering::Relaxed);
        }
        fn drain_signals(&mut self) -> Vec<TradingSignal> {
            std::mem::take(&mut self.pending)
        }
        fn can_send_order(&self) -> bool {
            self.control.can_send_new_orders()
        }
        fn check_squareoff(&self) -> Option<FlattenReason> {
            None
        }
        fn handle_square_on(&mut self) -> bool {
            self.control.apply(ControlEvent::TryRecover, true, false)
        }
        fn handle_squareoff(&mut self, _current_price: Decimal) -> Vec<TradingSignal> {
            vec![]
        }
        fn set_thresholds(&mut self, _thresholds: crate::domain::threshold::ThresholdSet) {}
        fn control_state(&self) -> &ControlState {
            &self.control
        }
        fn trigger_flatten(&mut self, reason: FlattenReason, aggressive: bool) {
            self.control.apply(ControlEvent::TriggerFlatten { reason, aggressive }, true, false);
        }
        fn trigger_exit(&mut self, reason: FlattenReason) {
            self.control.apply(ControlEvent::TriggerExit { reason }, true, false);
        }
        fn is_position_flat(&self) -> bool {
            true
        }
        fn has_pending_signals(&self) -> bool {
            !self.pending.is_empty()
        }
        fn risk_snapshot(&self) -> RiskSnapshot {
            self.risk
        }
    }

    fn tick(symbol: &str) -> MarketTick {
        MarketTick {
            symbol: symbol.to_string(),
            exchange: "CFFEX".to_string(),
            timestamp_ns: 0,
            bid_prices: vec![dec!(100.0)],
            bid_qty: vec![10],
            ask_prices: vec![dec!(100.2)],
            ask_qty: vec![10],
            last_price: dec!(100.1),
            total_volume: 0,
            turnover: Decimal::ZERO,
            feed_type: FeedType::Continuous,
        }
    }

    fn engine() -> StrategyEngine {
        let router = Arc::new(InMemoryOrderRouter::new(Duration::from_millis(1)));
        StrategyEngine::new(router, RiskLimits::default(), Duration::from_millis(50))
    }

    #[test]
    fn market_data_only_dispatches_to_strategies_watching_that_symbol() {
        let engine = engine();
        let a_ticks = Arc::new(AtomicU32::new(0));
        let b_ticks = Arc::new(AtomicU32::new(0));
        let a = Arc::new(Mutex::new(StubStrategy::new(1, "IF2412", a_ticks.clone(), Arc::new(AtomicU32::new(0))))) as StrategyHandle;
        let b = Arc::new(Mutex::new(StubStrategy::new(2, "IH2412", b_ticks.clone(), Arc::new(AtomicU32::new(0))))) as StrategyHandle;
        engine.register_strategy(a);
        engine.register_strategy(b);

        engine.dispatch_market_data(&tick("IF2412"));

        assert_eq!(a_ticks.load(Ordering::Relaxed), 1);
        assert_eq!(b_ticks.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn timer_tick_invokes_on_timer_for_every_strategy() {
        let engine = engine();
        let timers_seen = Arc::new(AtomicU32::new(0));
        let s = Arc::new(Mutex::new(StubStrategy::new(1, "IF2412", Arc::new(AtomicU32::new(0)), timers_seen.clone()))) as StrategyHandle;
        engine.register_strategy(s);
        engine.run_timer_tick(0, &HashMap::new());
        assert_eq!(timers_seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn max_loss_snapshot_drives_strategy_into_exiting() {
        let engine = engine();
        let mut stub = StubStrategy::new(1, "IF2412", Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)));
        stub.risk = RiskSnapshot {
            net_pnl: dec!(-999999),
            ..Default::default()
        };
        let s = Arc::new(Mutex::new(stub)) as StrategyHandle;
        engine.register_strategy(s.clone());
        engine.run_timer_tick(0, &HashMap::new());
        assert_eq!(s.lock().control_state().run_state, RunState::Exiting);
    }
}
