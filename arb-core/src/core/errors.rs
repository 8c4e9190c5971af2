//! Domain error taxonomy (§7).
//!
//! Six kinds, each with distinct propagation rules: `ConfigError` and
//! `ProtocolError` are locally recovered and logged; `TransportError` never
//! mutates position state; `PolicyViolation` is a typed no-op result, not a
//! panic; `RiskTrip` and `FatalInvariant` surface as control-state
//! transitions plus a single structured log line (see
//! [`crate::domain::control`]).

use crate::core::types::Side;
use thiserror::Error;

/// The top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or contradictory parameters at init or hot-reload. The
    /// caller is expected to retain the prior configuration.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// The transport (NATS/router) was unreachable or timed out. The order
    /// was not considered sent; position state must not be mutated.
    #[error("transport error sending to {destination}: {reason}")]
    Transport { destination: String, reason: String },

    /// A malformed incoming message; the message is dropped with a log,
    /// never panics the caller.
    #[error("protocol error decoding {subject}: {reason}")]
    Protocol { subject: String, reason: String },

    /// An operation that would violate a structural invariant (e.g.
    /// duplicate order at the same price/side) returns this as a no-op
    /// result rather than raising an exception.
    #[error("policy violation: {reason}")]
    PolicyViolation { reason: String },

    /// A risk limit tripped (stop-loss, max-loss, reject-limit,
    /// price-limit, delta-limit). Routed to `TriggerFlatten` or
    /// `TriggerExit` per the §4.5 transition table.
    #[error("risk trip ({kind}): {reason}")]
    RiskTrip { kind: RiskTripKind, reason: String },

    /// Position/order math violated an invariant (e.g. negative
    /// `openQty`). The owning strategy is forced into `Exiting` with this
    /// as the diagnostic reason.
    #[error("fatal invariant violated: {reason}")]
    FatalInvariant { reason: String },
}

impl EngineError {
    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Config { reason: reason.into() }
    }

    pub fn transport(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Transport {
            destination: destination.into(),
            reason: reason.into(),
        }
    }

    pub fn protocol(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Protocol {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn policy_violation(reason: impl Into<String>) -> Self {
        EngineError::PolicyViolation { reason: reason.into() }
    }

    pub fn risk_trip(kind: RiskTripKind, reason: impl Into<String>) -> Self {
        EngineError::RiskTrip {
            kind,
            reason: reason.into(),
        }
    }

    pub fn fatal_invariant(reason: impl Into<String>) -> Self {
        EngineError::FatalInvariant { reason: reason.into() }
    }

    /// `RiskTrip` and `FatalInvariant` are the two kinds that must surface
    /// as control-state transitions rather than being locally swallowed
    /// (§7's propagation rule).
    pub fn requires_control_transition(&self) -> bool {
        matches!(self, EngineError::RiskTrip { .. } | EngineError::FatalInvariant { .. })
    }
}

/// The specific risk check that tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTripKind {
    StopLoss,
    MaxLoss,
    RejectLimit,
    PriceLimit,
    DeltaLimit,
    AggressiveRetryExhausted,
    MaxOrderCount,
}

impl std::fmt::Display for RiskTripKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTripKind::StopLoss => "stop-loss",
            RiskTripKind::MaxLoss => "max-loss",
            RiskTripKind::RejectLimit => "reject-limit",
            RiskTripKind::PriceLimit => "price-limit",
            RiskTripKind::DeltaLimit => "delta-limit",
            RiskTripKind::AggressiveRetryExhausted => "aggressive-retry-exhausted",
            RiskTripKind::MaxOrderCount => "max-order-count",
        };
        write!(f, "{s}")
    }
}

/// Errors from [`crate::domain::leg_book::PerLegBook::apply_fill`] and
/// friends, distinct from `EngineError` because they need the order side
/// for diagnostics and are always local (never cross a strategy boundary).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FillError {
    #[error("fill quantity {fill_qty} for order {order_id} exceeds remaining {remaining_qty}")]
    ExceedsRemaining {
        order_id: u128,
        fill_qty: u64,
        remaining_qty: u64,
    },
    #[error("zero quantity fill for order {order_id}")]
    ZeroQuantity { order_id: u128 },
    #[error("fill on side {side} references an order not tracked by this book (order {order_id})")]
    UnknownOrder { order_id: u128, side: Side },
}
