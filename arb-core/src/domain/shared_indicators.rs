//! C8 — SharedIndicatorPool (§4.8): one calculation per symbol per tick,
//! shared across every strategy subscribed to that symbol.

use crate::domain::spread::SpreadAnalyzer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A single symbol's shared state: one `SpreadAnalyzer` per distinct pair
/// key a strategy has registered for that symbol. Keyed by pair key rather
/// than by symbol alone since two strategies may pair the same leg against
/// different counter-legs (§4.8).
#[derive(Default)]
struct SymbolIndicators {
    spreads: HashMap<String, SpreadAnalyzer>,
}

/// C8. `updateAll` runs each registered indicator exactly once per tick per
/// symbol; strategies then look the result up by pair key instead of
/// recomputing it themselves ("shared-then-private": a strategy with
/// bespoke needs may still keep its own private `SpreadAnalyzer` alongside
/// this pool).
#[derive(Default)]
pub struct SharedIndicatorPool {
    by_symbol: RwLock<HashMap<String, Arc<RwLock<SymbolIndicators>>>>,
}

impl SharedIndicatorPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn symbol_entry(&self, symbol: &str) -> Arc<RwLock<SymbolIndicators>> {
        if let Some(existing) = self.by_symbol.read().get(symbol) {
            return existing.clone();
        }
        self.by_symbol
            .write()
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(SymbolIndicators::default())))
            .clone()
    }

    /// Register a pair-key analyzer for `symbol` if one doesn't already
    /// exist. Idempotent: registering twice keeps the first instance (and
    /// its accumulated history) rather than resetting it.
    pub fn register_spread(
        &self,
        symbol: &str,
        pair_key: &str,
        make: impl FnOnce() -> SpreadAnalyzer,
    ) {
        let entry = self.symbol_entry(symbol);
        let mut guard = entry.write();
        guard.spreads.entry(pair_key.to_string()).or_insert_with(make);
    }

    /// Feed a new paired tick into `symbol`'s `pair_key` analyzer (§4.8
    /// `updateAll`). No-op if the pair was never registered.
    pub fn update(&self, symbol: &str, pair_key: &str, price1: f64, price2: f64, window: usize) {
        if let Some(entry) = self.by_symbol.read().get(symbol).cloned() {
            if let Some(analyzer) = entry.write().spreads.get_mut(pair_key) {
                analyzer.update(price1, price2, window);
            }
        }
    }

    /// Shared-then-private lookup: clone the shared analyzer's current
    /// snapshot for a strategy to read without holding the pool lock.
    pub fn snapshot(&self, symbol: &str, pair_key: &str) -> Option<SpreadAnalyzer> {
        self.by_symbol
            .read()
            .get(symbol)?
            .read()
            .spreads
            .get(pair_key)
            .cloned()
    }

    pub fn symbol_count(&self) -> usize {
        self.by_symbol.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::spread::SpreadType;

    #[test]
    fn register_is_idempotent_and_preserves_history() {
        let pool = SharedIndicatorPool::new();
        pool.register_spread("IF2409", "IF-IH", || SpreadAnalyzer::new(SpreadType::Difference, 50, 0.1));
        pool.update("IF2409", "IF-IH", 100.0, 98.0, 10);
        pool.register_spread("IF2409", "IF-IH", || SpreadAnalyzer::new(SpreadType::Difference, 50, 0.1));
        let snap = pool.snapshot("IF2409", "IF-IH").unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn two_strategies_sharing_a_symbol_see_the_same_updates() {
        let pool = SharedIndicatorPool::new();
        pool.register_spread("IF2409", "IF-IH", || SpreadAnalyzer::new(SpreadType::Difference, 50, 0.1));
        pool.update("IF2409", "IF-IH", 100.0, 98.0, 10);
        pool.update("IF2409", "IF-IH", 101.0, 98.5, 10);

        let view_a = pool.snapshot("IF2409", "IF-IH").unwrap();
        let view_b = pool.snapshot("IF2409", "IF-IH").unwrap();
        assert_eq!(view_a.len(), 2);
        assert_eq!(view_b.len(), 2);
        assert_eq!(view_a.current_spread(), view_b.current_spread());
    }

    #[test]
    fn update_on_unregistered_pair_is_a_no_op() {
        let pool = SharedIndicatorPool::new();
        pool.update("UNKNOWN", "X-Y", 1.0, 2.0, 5);
        assert!(pool.snapshot("UNKNOWN", "X-Y").is_none());
    }

    #[test]
    fn distinct_pair_keys_on_the_same_symbol_stay_independent() {
        let pool = SharedIndicatorPool::new();
        pool.register_spread("IF2409", "IF-IH", || SpreadAnalyzer::new(SpreadType::Difference, 50, 0.1));
        pool.register_spread("IF2409", "IF-IC", || SpreadAnalyzer::new(SpreadType::Difference, 50, 0.1));
        pool.update("IF2409", "IF-IH", 100.0, 98.0, 10);
        assert_eq!(pool.snapshot("IF2409", "IF-IH").unwrap().len(), 1);
        assert_eq!(pool.snapshot("IF2409", "IF-IC").unwrap().len(), 0);
    }
}
