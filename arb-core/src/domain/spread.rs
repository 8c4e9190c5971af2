//! C4 — SpreadAnalyzer (§4.4): rolling mean/std/correlation/hedge-ratio over
//! a bounded window of paired-tick prices, plus the EMA-adjusted spread mean
//! and z-score used by the pairs strategy (§4.6.1).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the spread between the two legs is computed (§3 `SpreadState.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadType {
    Difference,
    Ratio,
    Log,
}

impl SpreadType {
    pub fn compute(self, price1: f64, price2: f64) -> f64 {
        match self {
            SpreadType::Difference => price1 - price2,
            SpreadType::Ratio => {
                if price2.abs() < f64::EPSILON {
                    0.0
                } else {
                    price1 / price2
                }
            }
            SpreadType::Log => {
                if price1 <= 0.0 || price2 <= 0.0 {
                    0.0
                } else {
                    price1.ln() - price2.ln()
                }
            }
        }
    }
}

/// Below this variance of leg-2 prices the OLS hedge-ratio denominator is
/// treated as degenerate and the ratio falls back to 1.0 (§4.4).
const HEDGE_RATIO_VAR_EPSILON: f64 = 1e-9;

/// C4. Maintains a bounded ring of `(price1, price2)` samples and recomputes
/// mean/std/correlation/hedge-ratio over the tail window on each paired
/// tick, plus a separately-persisted EMA of the spread (`μ_ori`, §4.6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadAnalyzer {
    pub spread_type: SpreadType,
    pub max_history: usize,
    history: VecDeque<(f64, f64)>,
    pub mean: f64,
    pub std: f64,
    pub correlation: f64,
    pub hedge_ratio: f64,
    /// `μ_ori`: EMA of observed spreads, updated on every matched tick.
    pub ema_mean: f64,
    pub ema_alpha: f64,
    logged_degenerate_hedge_once: bool,
}

impl SpreadAnalyzer {
    pub fn new(spread_type: SpreadType, max_history: usize, ema_alpha: f64) -> Self {
        Self {
            spread_type,
            max_history,
            history: VecDeque::with_capacity(max_history),
            mean: 0.0,
            std: 0.0,
            correlation: 0.0,
            hedge_ratio: 1.0,
            ema_mean: 0.0,
            ema_alpha,
            logged_degenerate_hedge_once: false,
        }
    }

    pub fn is_ready(&self, window: usize) -> bool {
        self.history.len() >= window
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Current spread of the most recent sample under `self.spread_type`.
    pub fn current_spread(&self) -> Option<f64> {
        self.history
            .back()
            .map(|&(p1, p2)| self.spread_type.compute(p1, p2))
    }

    /// Append a paired tick and recompute statistics over the tail `window`
    /// (§4.4). Also advances the EMA mean (§4.6.1): `μ_ori ← (1-α)·μ_ori + α·spread_cur`.
    pub fn update(&mut self, price1: f64, price2: f64, window: usize) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back((price1, price2));

        let spread_cur = self.spread_type.compute(price1, price2);
        if self.history.len() == 1 {
            self.ema_mean = spread_cur;
        } else {
            self.ema_mean = (1.0 - self.ema_alpha) * self.ema_mean + self.ema_alpha * spread_cur;
        }

        self.recompute(window);
    }

    /// Seed the EMA mean directly, e.g. on daily restore (§4.4 `SetSpreadMean`).
    pub fn set_spread_mean(&mut self, mean: f64) {
        self.ema_mean = mean;
    }

    /// `z = (spread_cur − μ) / σ` where `μ = μ_ori + tValue` (§4.6.1).
    pub fn adjusted_zscore(&self, t_value: f64) -> Option<f64> {
        let spread_cur = self.current_spread()?;
        if self.std <= f64::EPSILON {
            return None;
        }
        let mu = self.ema_mean + t_value;
        Some((spread_cur - mu) / self.std)
    }

    fn recompute(&mut self, window: usize) {
        let window = window.min(self.history.len()).max(1);
        let tail: Vec<(f64, f64)> = self
            .history
            .iter()
            .rev()
            .take(window)
            .copied()
            .collect();
        let n = tail.len() as f64;

        let spreads: Vec<f64> = tail
            .iter()
            .map(|&(p1, p2)| self.spread_type.compute(p1, p2))
            .collect();
        let mean = spreads.iter().sum::<f64>() / n;
        // Population variance: fixed, bounded lookback rather than a
        // growing sample (§4.4).
        let variance = spreads.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        let mean1 = tail.iter().map(|&(p1, _)| p1).sum::<f64>() / n;
        let mean2 = tail.iter().map(|&(_, p2)| p2).sum::<f64>() / n;
        let cov = tail
            .iter()
            .map(|&(p1, p2)| (p1 - mean1) * (p2 - mean2))
            .sum::<f64>()
            / n;
        let var1 = tail.iter().map(|&(p1, _)| (p1 - mean1).powi(2)).sum::<f64>() / n;
        let var2 = tail.iter().map(|&(_, p2)| (p2 - mean2).powi(2)).sum::<f64>() / n;

        self.correlation = if var1 > 0.0 && var2 > 0.0 {
            cov / (var1.sqrt() * var2.sqrt())
        } else {
            0.0
        };

        self.hedge_ratio = if var2 > HEDGE_RATIO_VAR_EPSILON {
            cov / var2
        } else {
            if !self.logged_degenerate_hedge_once {
                tracing::warn!("SpreadAnalyzer: leg-2 variance near zero, hedge_ratio falling back to 1.0");
                self.logged_degenerate_hedge_once = true;
            }
            1.0
        };

        self.mean = mean;
        self.std = std;
    }
}

/// Decimal convenience wrapper for callers that carry prices as `Decimal`.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
