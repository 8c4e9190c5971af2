//! Trading Engine (C7, §4.7)
//!
//! - `strategy`: the `Strategy` capability-set trait every hosted
//!   strategy implements, plus the `StrategyId`/`RiskSnapshot` types the
//!   engine and risk layer use to address and inspect strategies.
//! - `dispatch`: `StrategyEngine`, the multi-tenant dispatcher — market
//!   data fan-out, order-update fan-in, and the timer/risk loop.

pub mod dispatch;
pub mod strategy;

pub use dispatch::StrategyEngine;
pub use strategy::{RiskSnapshot, Strategy, StrategyId};
