//! The `Strategy` trait: the capability set every hosted strategy exposes
//! to the engine (§9 redesign notes) — composition over the source's
//! `PairsArb extends Execution` inheritance. A strategy owns its own
//! execution book(s) and `ControlState`; the engine only ever calls
//! through this trait.

use crate::domain::control::{ControlState, FlattenReason};
use crate::domain::signal::{MarketTick, OrderUpdate, TradingSignal};
use crate::domain::threshold::ThresholdSet;
use rust_decimal::Decimal;
use std::fmt;

/// Identifies a strategy instance across the engine's registry and on the
/// `order.>` fan-in path (`OrderUpdate::strategy_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct StrategyId(pub u64);

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only snapshot the engine's risk detectors (§4.7.3 `performStateCheck`)
/// consult without reaching into strategy-private state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskSnapshot {
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub net_pnl: Decimal,
    pub drawdown: Decimal,
    pub reject_count: u64,
    pub position: Decimal,
}

/// Capability set `{Reset, OnMarketData, OnAuctionData, OnOrderUpdate,
/// OnTimer, SendOrder, CheckSquareoff, HandleSquareON, HandleSquareoff,
/// SetThresholds}` plus status accessors (§9). Dyn-compatible so the
/// engine can host many strategy *kinds* behind one registry.
///
/// Methods that mutate state are only ever called by the engine while
/// holding that strategy's own lock (§5): a strategy implementation may
/// assume single-threaded access to itself.
pub trait Strategy: Send {
    fn id(&self) -> StrategyId;

    fn symbols(&self) -> &[String];

    /// §4.6.6 day boundary: snapshot pass position into yesterday, zero
    /// day counters and P&L, clear order maps.
    fn reset(&mut self);

    /// §4.7.1: invoked inline (sync path) or from a task (async path) on
    /// every continuous-trading tick for a symbol this strategy watches.
    fn on_market_data(&mut self, tick: &MarketTick);

    /// As `on_market_data`, for pre-open auction ticks.
    fn on_auction_data(&mut self, tick: &MarketTick);

    /// §4.7.2: delivered for every update on `order.>`; implementations
    /// must ignore updates whose `strategy_id` isn't their own (the engine
    /// does not pre-filter).
    fn on_order_update(&mut self, update: &OrderUpdate);

    /// §4.7.3 timer loop: called after `performStateCheck` and, if
    /// applicable, `handle_squareoff` have run for this tick.
    fn on_timer(&mut self, now_ns: u64);

    /// SendOrder capability: drain and return signals accumulated since
    /// the last drain. The engine verifies `can_send_order` per signal
    /// before routing (§4.7.1); draining clears the internal queue
    /// regardless of what the engine does with the result.
    fn drain_signals(&mut self) -> Vec<TradingSignal>;

    /// `canSendNewOrders` gate a caller must check before routing any
    /// signal this strategy produced.
    fn can_send_order(&self) -> bool;

    /// CheckSquareoff: does this strategy's own state (independent of the
    /// engine's `performStateCheck` detectors) call for a flatten right
    /// now? Returns the reason if so.
    fn check_squareoff(&self) -> Option<FlattenReason>;

    /// HandleSquareON: attempt recovery from `Flattening` back to
    /// `Active` (§4.5 `TryRecover`). Returns `true` if it transitioned.
    fn handle_square_on(&mut self) -> bool;

    /// HandleSquareoff: in flatten/exit mode, emit the closing orders for
    /// the current reference price (§4.7.3). Returns the closing signals;
    /// does not itself route them.
    fn handle_squareoff(&mut self, current_price: Decimal) -> Vec<TradingSignal>;

    /// Hot-reload thresholds (construct-then-swap at the call site; the
    /// strategy just adopts the new bundle).
    fn set_thresholds(&mut self, thresholds: ThresholdSet);

    fn control_state(&self) -> &ControlState;

    fn trigger_flatten(&mut self, reason: FlattenReason, aggressive: bool);

    fn trigger_exit(&mut self, reason: FlattenReason);

    /// Whether every leg's `netPos` is zero — the `positionFlat` precondition
    /// `TryRecover`/`CompleteExit` require.
    fn is_position_flat(&self) -> bool;

    /// Whether this strategy still has unrouted signals — the
    /// `hasPendingSignals` precondition `CompleteExit` requires.
    fn has_pending_signals(&self) -> bool;

    fn risk_snapshot(&self) -> RiskSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_id_displays_as_its_integer() {
        assert_eq!(StrategyId(42).to_string(), "42");
    }

    #[test]
    fn risk_snapshot_defaults_to_flat_zero_state() {
        let snap = RiskSnapshot::default();
        assert_eq!(snap.position, Decimal::ZERO);
        assert_eq!(snap.net_pnl, Decimal::ZERO);
    }
}
