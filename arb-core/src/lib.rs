//! Arb Core - multi-tenant pairs-arbitrage strategy runtime
//!
//! Hosts many live trading strategies against Chinese-futures net-position
//! accounting: market data fans out to every running strategy, strategies
//! hand back trading signals, order/trade callbacks fan back in and are
//! reconciled into per-strategy books, and a control state machine drives
//! pause/flatten/exit transitions off risk triggers.
//!
//! ## Modules
//! - `core`: fixed-point conversions, order identifiers, domain error taxonomy
//! - `domain`: the algorithmic heart — ThresholdSet, OrderStats/OrderPriceMap,
//!   PerLegExecutionBook, SpreadAnalyzer, ControlStateMachine, SharedIndicatorPool
//! - `engine`: the multi-tenant dispatcher, order router boundary, engine-level
//!   risk detectors
//! - `feed`: market-data source and shared-memory override boundary contracts
//! - `persistence`: daily-init file and position-snapshot file I/O
//! - `config`: process and strategy configuration loading
//! - `risk`: engine-level risk limits and violation reporting
//! - `utils`: logging and metrics setup
//! - `perf`: CPU affinity and thread-priority helpers for latency-sensitive threads

pub mod config;
pub mod core;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod perf;
pub mod persistence;
pub mod risk;
pub mod utils;

pub use crate::core::{errors::EngineError, fixed_point, OrderId, Side};
pub use domain::control::{ControlState, FlattenReason, RunState};
pub use domain::leg_book::PerLegBook;
pub use domain::signal::{Instrument, MarketTick, OrderCategory, TradingSignal};
pub use domain::threshold::ThresholdSet;
pub use engine::dispatch::StrategyEngine;
pub use engine::strategy::{Strategy, StrategyId};

pub use anyhow::{Error, Result};

/// Convenience re-exports for strategy implementors.
pub mod prelude {
    pub use crate::core::{errors::EngineError, fixed_point, OrderId, Side};
    pub use crate::domain::control::{ControlState, FlattenReason, RunState};
    pub use crate::domain::leg_book::PerLegBook;
    pub use crate::domain::order_book::{OrderPriceMap, OrderStats};
    pub use crate::domain::signal::{
        Instrument, MarketTick, OrderCategory, TimeInForce, TradingSignal,
    };
    pub use crate::domain::spread::SpreadAnalyzer;
    pub use crate::domain::threshold::ThresholdSet;
    pub use crate::engine::strategy::{Strategy, StrategyId};
    pub use crate::{Error, Result};
}
