//! Engine-level risk detectors (§4.7.3 `performStateCheck`).
//!
//! Three configuration-driven detectors — stop-loss, max-loss,
//! reject-limit — evaluated against a [`RiskSnapshot`](crate::engine::strategy::RiskSnapshot)
//! reported by each strategy. This is a direct generalization of the
//! reference risk manager's `validate_signal`/`should_halt_trading`
//! checks, re-expressed as "detect and route to the control state
//! machine" rather than "validate and reject a single order", since
//! multiple strategies share one engine instance instead of one risk
//! manager per process. Position and per-strategy limits
//! (`maxPositionSize`/`maxExposure`) are enforced inside the strategy
//! itself, not here.

pub mod types;

pub use types::{RiskLimits, RiskVerdict};

use crate::domain::control::FlattenReason;
use crate::engine::strategy::RiskSnapshot;

/// Stateless evaluator: one instance shared read-only across every
/// strategy's timer tick (the limits are process-wide, per §4.7.3).
#[derive(Debug, Clone)]
pub struct RiskDetectors {
    limits: RiskLimits,
}

impl RiskDetectors {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Run the three detectors in priority order: max-loss (exit) first,
    /// since it supersedes a mere flatten; then stop-loss; then
    /// reject-limit. Returns the first verdict that isn't `Ok`.
    pub fn perform_state_check(&self, snapshot: &RiskSnapshot) -> RiskVerdict {
        if snapshot.net_pnl <= self.limits.max_loss {
            return RiskVerdict::Exit {
                reason: FlattenReason::MaxLoss,
            };
        }
        if snapshot.net_pnl <= self.limits.stop_loss {
            return RiskVerdict::Flatten {
                reason: FlattenReason::StopLoss,
                aggressive: false,
            };
        }
        if snapshot.reject_count >= self.limits.reject_limit {
            return RiskVerdict::Flatten {
                reason: FlattenReason::MaxOrderCount,
                aggressive: false,
            };
        }
        RiskVerdict::Ok
    }
}
