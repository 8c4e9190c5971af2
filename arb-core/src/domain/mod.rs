//! The algorithmic heart of the engine: parameter sets, order/position
//! books, spread statistics, the control state machine, and the
//! cross-strategy indicator pool.

pub mod control;
pub mod leg_book;
pub mod order_book;
pub mod shared_indicators;
pub mod signal;
pub mod spread;
pub mod threshold;

pub use control::{ControlEvent, ControlState, FlattenReason, RunState};
pub use leg_book::{BookCounters, BookPnl, PerLegBook};
pub use order_book::{OrderPriceMap, OrderStats, QueueEvent};
pub use shared_indicators::SharedIndicatorPool;
pub use signal::{
    FeedType, Instrument, MarketTick, OrderCategory, OrderUpdate, OrderUpdateStatus, TimeInForce,
    TradingSignal,
};
pub use spread::{SpreadAnalyzer, SpreadType};
pub use threshold::{ThresholdPair, ThresholdSet};
