//! Configuration and outcome types for the engine-level risk detectors
//! (§4.7.3). Per-strategy position/PnL state itself lives in
//! [`crate::domain::leg_book::PerLegBook`]; this module only holds the
//! limits `performStateCheck` enforces against the snapshot a strategy
//! reports.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Engine-level risk limits, one bundle applied uniformly across every
/// hosted strategy (per-strategy overrides are out of scope — see
/// `StrategyConfig.maxPositionSize`/`maxExposure` for position-level
/// limits enforced by the strategy itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Net loss (realized + unrealized) below which stop-loss fires.
    pub stop_loss: Decimal,
    /// Net loss below which max-loss fires (exit, non-recoverable).
    pub max_loss: Decimal,
    /// Consecutive order rejects before reject-limit fires.
    pub reject_limit: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            stop_loss: Decimal::new(-5000, 0),
            max_loss: Decimal::new(-20000, 0),
            reject_limit: 5,
        }
    }
}

/// What `performStateCheck` decided for a strategy this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    /// No detector tripped.
    Ok,
    /// A recoverable detector tripped: caller should call
    /// `strategy.trigger_flatten(reason, aggressive)`.
    Flatten {
        reason: crate::domain::control::FlattenReason,
        aggressive: bool,
    },
    /// A non-recoverable detector tripped: caller should call
    /// `strategy.trigger_exit(reason)`.
    Exit {
        reason: crate::domain::control::FlattenReason,
    },
}
