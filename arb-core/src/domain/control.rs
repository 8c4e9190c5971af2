//! C5 — ControlStateMachine (§4.5): the active/paused/flattening/exiting/
//! stopped lifecycle shared by every strategy, plus recoverable vs
//! non-recoverable flatten reasons.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// The strategy's run state (§3 `ControlState.runState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Active,
    Paused,
    Flattening,
    Exiting,
    Stopped,
}

/// Why a flatten or exit was triggered (§4.5 reason table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenReason {
    StopLoss,
    PriceLimit,
    DeltaLimit,
    TimeLimit,
    MaxLoss,
    MaxOrderCount,
    Manual,
    AggressiveRetryExhausted,
    FatalInvariant,
}

impl FlattenReason {
    /// §4.5 reason→cooldown/recovery table.
    pub fn can_recover(self) -> bool {
        matches!(
            self,
            FlattenReason::StopLoss | FlattenReason::PriceLimit | FlattenReason::DeltaLimit
        )
    }

    /// Cooldown in seconds before `TryRecover` is permitted; `None` means
    /// the reason never recovers (cooldown is infinite).
    pub fn cooldown_secs(self) -> Option<u64> {
        match self {
            FlattenReason::StopLoss => Some(15 * 60),
            FlattenReason::PriceLimit => Some(60),
            FlattenReason::DeltaLimit => Some(5 * 60),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlattenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlattenReason::StopLoss => "stop_loss",
            FlattenReason::PriceLimit => "price_limit",
            FlattenReason::DeltaLimit => "delta_limit",
            FlattenReason::TimeLimit => "time_limit",
            FlattenReason::MaxLoss => "max_loss",
            FlattenReason::MaxOrderCount => "max_order_count",
            FlattenReason::Manual => "manual",
            FlattenReason::AggressiveRetryExhausted => "aggressive-retry exhausted",
            FlattenReason::FatalInvariant => "fatal_invariant",
        };
        write!(f, "{s}")
    }
}

/// Events that drive the state machine (§4.5).
#[derive(Debug, Clone, Copy)]
pub enum ControlEvent {
    Activate,
    Deactivate,
    TriggerFlatten { reason: FlattenReason, aggressive: bool },
    TryRecover,
    TriggerExit { reason: FlattenReason },
    CompleteExit,
}

/// §3 `ControlState`. Owned by a strategy; the strategy's own `PerLegBook`s
/// answer the "is position flat" and "are there pending signals" questions
/// `TryRecover`/`CompleteExit` need, so this type only tracks its own flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlState {
    pub run_state: RunState,
    pub active: bool,
    pub flatten_mode: bool,
    pub cancel_pending: bool,
    pub exit_requested: bool,
    pub aggressive_flat: bool,
    pub flatten_reason: Option<FlattenReason>,
    pub flatten_time_secs: u64,
    pub can_recover_at_secs: u64,
    pub exit_reason: Option<FlattenReason>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            run_state: RunState::Active,
            active: true,
            flatten_mode: false,
            cancel_pending: false,
            exit_requested: false,
            aggressive_flat: false,
            flatten_reason: None,
            flatten_time_secs: 0,
            can_recover_at_secs: 0,
            exit_reason: None,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `canSendNewOrders` gate (§4.5) that every order path must check.
    pub fn can_send_new_orders(&self) -> bool {
        self.active
            && self.run_state == RunState::Active
            && !self.flatten_mode
            && !self.exit_requested
    }

    /// Apply an event to the state machine (§4.5 transition table). Returns
    /// `true` if the event produced a transition, `false` if it was a
    /// well-defined no-op (e.g. `Activate` on a `Stopped` strategy).
    ///
    /// `position_flat` and `has_pending_signals` are supplied by the caller
    /// (the owning strategy knows its own books); `TryRecover` and
    /// `CompleteExit` consult them per the table's preconditions.
    pub fn apply(
        &mut self,
        event: ControlEvent,
        position_flat: bool,
        has_pending_signals: bool,
    ) -> bool {
        match event {
            ControlEvent::Activate => {
                if self.run_state == RunState::Stopped {
                    // Stopped → Activate is a documented no-op: cannot
                    // revive a stopped strategy.
                    false
                } else {
                    self.active = true;
                    true
                }
            }
            ControlEvent::Deactivate => {
                self.active = false;
                true
            }
            ControlEvent::TriggerFlatten { reason, aggressive } => {
                self.flatten_mode = true;
                self.cancel_pending = true;
                self.aggressive_flat = aggressive;
                self.run_state = RunState::Flattening;
                self.flatten_reason = Some(reason);
                self.flatten_time_secs = now_secs();
                self.can_recover_at_secs = match reason.cooldown_secs() {
                    Some(c) if reason.can_recover() => self.flatten_time_secs + c,
                    _ => u64::MAX,
                };
                true
            }
            ControlEvent::TryRecover => {
                let reason = match self.flatten_reason {
                    Some(r) => r,
                    None => return false,
                };
                let permitted = self.run_state == RunState::Flattening
                    && position_flat
                    && now_secs() >= self.can_recover_at_secs
                    && !self.exit_requested
                    && reason.can_recover();
                if !permitted {
                    return false;
                }
                self.flatten_mode = false;
                self.cancel_pending = false;
                self.aggressive_flat = false;
                self.flatten_reason = None;
                self.can_recover_at_secs = 0;
                self.run_state = RunState::Active;
                true
            }
            ControlEvent::TriggerExit { reason } => {
                self.exit_requested = true;
                self.flatten_mode = true;
                self.cancel_pending = true;
                self.run_state = RunState::Exiting;
                self.exit_reason = Some(reason);
                true
            }
            ControlEvent::CompleteExit => {
                if self.run_state != RunState::Exiting || !position_flat || has_pending_signals {
                    return false;
                }
                self.run_state = RunState::Stopped;
                self.active = false;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_send_new_orders_requires_active_and_no_flatten_or_exit() {
        let mut s = ControlState::new();
        assert!(s.can_send_new_orders());
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::StopLoss,
                aggressive: false,
            },
            false,
            false,
        );
        assert!(!s.can_send_new_orders());
    }

    #[test]
    fn trigger_flatten_sets_recoverable_cooldown_for_stop_loss() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::StopLoss,
                aggressive: true,
            },
            false,
            false,
        );
        assert_eq!(s.run_state, RunState::Flattening);
        assert!(s.aggressive_flat);
        assert!(s.can_recover_at_secs > s.flatten_time_secs);
        assert!(s.can_recover_at_secs < u64::MAX);
    }

    #[test]
    fn trigger_flatten_non_recoverable_reason_sets_infinite_cooldown() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::Manual,
                aggressive: false,
            },
            false,
            false,
        );
        assert_eq!(s.can_recover_at_secs, u64::MAX);
    }

    #[test]
    fn try_recover_refused_before_cooldown_elapses() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::PriceLimit,
                aggressive: false,
            },
            false,
            false,
        );
        // position flat, but cooldown (60s) has not elapsed
        let transitioned = s.apply(ControlEvent::TryRecover, true, false);
        assert!(!transitioned);
        assert_eq!(s.run_state, RunState::Flattening);
    }

    #[test]
    fn try_recover_refused_when_position_not_flat() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::StopLoss,
                aggressive: false,
            },
            false,
            false,
        );
        s.can_recover_at_secs = 0; // pretend cooldown elapsed
        let transitioned = s.apply(ControlEvent::TryRecover, false, false);
        assert!(!transitioned);
    }

    #[test]
    fn try_recover_succeeds_once_cooldown_and_flat() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::StopLoss,
                aggressive: false,
            },
            false,
            false,
        );
        s.can_recover_at_secs = 0;
        let transitioned = s.apply(ControlEvent::TryRecover, true, false);
        assert!(transitioned);
        assert_eq!(s.run_state, RunState::Active);
        assert!(!s.flatten_mode);
    }

    #[test]
    fn non_recoverable_reason_never_recovers() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerFlatten {
                reason: FlattenReason::MaxLoss,
                aggressive: false,
            },
            false,
            false,
        );
        assert_eq!(s.can_recover_at_secs, u64::MAX);
        let transitioned = s.apply(ControlEvent::TryRecover, true, false);
        assert!(!transitioned);
    }

    #[test]
    fn trigger_exit_from_any_state() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerExit {
                reason: FlattenReason::Manual,
            },
            false,
            false,
        );
        assert_eq!(s.run_state, RunState::Exiting);
        assert!(s.exit_requested);
        assert!(!s.can_send_new_orders());
    }

    #[test]
    fn complete_exit_refused_unless_flat_and_no_pending_signals() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerExit {
                reason: FlattenReason::Manual,
            },
            false,
            false,
        );
        assert!(!s.apply(ControlEvent::CompleteExit, false, false));
        assert!(!s.apply(ControlEvent::CompleteExit, true, true));
        assert!(s.apply(ControlEvent::CompleteExit, true, false));
        assert_eq!(s.run_state, RunState::Stopped);
        assert!(!s.active);
    }

    #[test]
    fn stopped_cannot_be_revived() {
        let mut s = ControlState::new();
        s.apply(
            ControlEvent::TriggerExit {
                reason: FlattenReason::Manual,
            },
            false,
            false,
        );
        s.apply(ControlEvent::CompleteExit, true, false);
        assert!(!s.apply(ControlEvent::Activate, true, false));
        assert_eq!(s.run_state, RunState::Stopped);
    }
}
