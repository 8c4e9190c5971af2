//! C1 — ThresholdSet (§4.1): an immutable-per-reload parameter bundle and
//! the position-linear dynamic threshold formulas.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A passive parameter bundle. Reload replaces the whole bundle
/// (construct-then-swap) so readers never observe a torn mix of old and
/// new parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub begin_place: Decimal,
    pub long_place: Decimal,
    pub short_place: Decimal,
    pub begin_remove: Decimal,
    pub long_remove: Decimal,
    pub short_remove: Decimal,
    pub use_dynamic_threshold: bool,
    /// Static fallback when dynamic thresholds are disabled or `N = 0`.
    pub static_entry: Decimal,
    pub static_exit: Decimal,
}

/// `(bid, ask)` pair produced by the dynamic threshold formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPair {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl ThresholdSet {
    fn long_place_diff(&self) -> Decimal {
        self.long_place - self.begin_place
    }

    fn short_place_diff(&self) -> Decimal {
        self.begin_place - self.short_place
    }

    fn long_remove_diff(&self) -> Decimal {
        self.long_remove - self.begin_remove
    }

    fn short_remove_diff(&self) -> Decimal {
        self.begin_remove - self.short_remove
    }

    /// Dynamic entry thresholds (§4.1) for signed net position `n` against
    /// cap `N`. Collapses to the static entry value when `N = 0` or dynamic
    /// thresholds are disabled.
    pub fn entry_thresholds(&self, n: Decimal, cap: Decimal) -> ThresholdPair {
        if !self.use_dynamic_threshold || cap == Decimal::ZERO {
            return ThresholdPair {
                bid: self.static_entry,
                ask: self.static_entry,
            };
        }
        dynamic_pair(
            n,
            cap,
            self.begin_place,
            self.long_place_diff(),
            self.short_place_diff(),
        )
    }

    /// Dynamic exit thresholds (§4.1), same law with the `_REMOVE` family.
    pub fn exit_thresholds(&self, n: Decimal, cap: Decimal) -> ThresholdPair {
        if !self.use_dynamic_threshold || cap == Decimal::ZERO {
            return ThresholdPair {
                bid: self.static_exit,
                ask: self.static_exit,
            };
        }
        dynamic_pair(
            n,
            cap,
            self.begin_remove,
            self.long_remove_diff(),
            self.short_remove_diff(),
        )
    }
}

fn dynamic_pair(
    n: Decimal,
    cap: Decimal,
    begin: Decimal,
    long_diff: Decimal,
    short_diff: Decimal,
) -> ThresholdPair {
    if n == Decimal::ZERO {
        return ThresholdPair { bid: begin, ask: begin };
    }
    let r = n / cap;
    if n > Decimal::ZERO {
        ThresholdPair {
            bid: begin + long_diff * r,
            ask: begin - short_diff * r,
        }
    } else {
        ThresholdPair {
            bid: begin + short_diff * r,
            ask: begin - long_diff * r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn thresholds() -> ThresholdSet {
        ThresholdSet {
            begin_place: dec!(2.0),
            long_place: dec!(3.5),
            short_place: dec!(0.5),
            begin_remove: dec!(1.0),
            long_remove: dec!(1.0),
            short_remove: dec!(1.0),
            use_dynamic_threshold: true,
            static_entry: dec!(2.0),
            static_exit: dec!(1.0),
        }
    }

    #[test]
    fn dynamic_entry_thresholds_match_the_spec_table() {
        let t = thresholds();
        let n = dec!(100);

        let p = t.entry_thresholds(dec!(0), n);
        assert_eq!((p.bid, p.ask), (dec!(2.0), dec!(2.0)));

        let p = t.entry_thresholds(dec!(100), n);
        assert_eq!((p.bid, p.ask), (dec!(3.5), dec!(0.5)));

        let p = t.entry_thresholds(dec!(-100), n);
        assert_eq!((p.bid, p.ask), (dec!(0.5), dec!(3.5)));

        let p = t.entry_thresholds(dec!(50), n);
        assert_eq!((p.bid, p.ask), (dec!(2.75), dec!(1.25)));

        let p = t.entry_thresholds(dec!(-50), n);
        assert_eq!((p.bid, p.ask), (dec!(1.25), dec!(2.75)));
    }

    #[test]
    fn zero_cap_collapses_to_static() {
        let t = thresholds();
        let p = t.entry_thresholds(dec!(40), dec!(0));
        assert_eq!((p.bid, p.ask), (t.static_entry, t.static_entry));
    }

    #[test]
    fn disabled_dynamic_collapses_to_static() {
        let mut t = thresholds();
        t.use_dynamic_threshold = false;
        let p = t.entry_thresholds(dec!(40), dec!(100));
        assert_eq!((p.bid, p.ask), (t.static_entry, t.static_entry));
    }

    #[test]
    fn dynamic_threshold_with_partial_position_scenario_5() {
        // Scenario 5: legFirst.netPos = 30, N=100, BEGIN=2.0, LONG=3.5, SHORT=0.5
        let t = thresholds();
        let p = t.entry_thresholds(dec!(30), dec!(100));
        assert_eq!(p.bid, dec!(2.45));
        assert_eq!(p.ask, dec!(1.55));
    }
}
