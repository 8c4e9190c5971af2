//! Typed view of the §6 strategy-config `parameters` bag for `pairs_arb`.
//! Deserialized via [`StrategyConfig::parameters_as`]; unrecognized keys
//! are ignored by `serde`'s default behavior rather than
//! `deny_unknown_fields`, matching the tolerance rule in §6.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PairsArbParams {
    pub lookback_period: usize,
    pub entry_zscore: f64,
    pub exit_zscore: f64,
    pub begin_zscore: f64,
    pub long_zscore: f64,
    pub short_zscore: f64,
    pub use_dynamic_threshold: bool,
    pub order_size: u64,
    pub max_position_size: f64,
    pub min_correlation: f64,
    pub spread_type: String,
    pub aggressive_enabled: bool,
    pub aggressive_interval_ms: u64,
    pub aggressive_max_retry: u32,
    pub aggressive_slop_ticks: u64,
    pub aggressive_fail_threshold: u32,
    pub supporting_orders: u64,
    pub alpha: f64,
    pub max_quote_level: u32,
    pub quote_level_sizes: Vec<u64>,
    pub enable_multi_level: bool,
    pub enable_price_optimize: bool,
    pub price_optimize_gap: u64,
    pub tick_size_1: f64,
    pub tick_size_2: f64,
    pub tvar_key: String,
    pub tcache_key: String,
    pub trade_interval_ms: u64,
    pub slippage_ticks: u64,
    pub use_market_price: bool,
}

impl Default for PairsArbParams {
    fn default() -> Self {
        Self {
            lookback_period: 60,
            entry_zscore: 2.0,
            exit_zscore: 0.5,
            begin_zscore: 2.0,
            long_zscore: 3.5,
            short_zscore: 0.5,
            use_dynamic_threshold: false,
            order_size: 1,
            max_position_size: 0.0,
            min_correlation: 0.0,
            spread_type: "difference".to_string(),
            aggressive_enabled: false,
            aggressive_interval_ms: 500,
            aggressive_max_retry: 3,
            aggressive_slop_ticks: 5,
            aggressive_fail_threshold: 3,
            supporting_orders: 0,
            alpha: 0.1,
            max_quote_level: 1,
            quote_level_sizes: Vec::new(),
            enable_multi_level: false,
            enable_price_optimize: false,
            price_optimize_gap: 2,
            tick_size_1: 0.2,
            tick_size_2: 0.2,
            tvar_key: "{id}".to_string(),
            tcache_key: "{id}".to_string(),
            trade_interval_ms: 0,
            slippage_ticks: 0,
            use_market_price: false,
        }
    }
}

impl PairsArbParams {
    /// `ConfigError` surface (§7): rejected at construction, leaving any
    /// prior strategy instance running under its last-valid config.
    pub fn validate(&self) -> Result<(), String> {
        if self.lookback_period == 0 {
            return Err("lookback_period must be > 0".to_string());
        }
        if self.alpha < 0.0 || self.alpha > 1.0 {
            return Err("alpha must be in [0, 1]".to_string());
        }
        if self.order_size == 0 {
            return Err("order_size must be > 0".to_string());
        }
        if !matches!(self.spread_type.as_str(), "difference" | "ratio" | "log") {
            return Err(format!("unknown spread_type '{}'", self.spread_type));
        }
        if self.tick_size_1 <= 0.0 || self.tick_size_2 <= 0.0 {
            return Err("tick_size_1/tick_size_2 must be > 0".to_string());
        }
        if self.aggressive_enabled && self.aggressive_max_retry == 0 {
            return Err("aggressive_max_retry must be > 0 when aggressive_enabled".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::value::Table;

    #[test]
    fn defaults_pass_validation() {
        assert!(PairsArbParams::default().validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_ignored_on_deserialize() {
        let table: Table = toml::from_str(
            r#"
            lookback_period = 20
            entry_zscore = 2.5
            not_a_real_parameter = "ignored"
            "#,
        )
        .unwrap();
        let params: PairsArbParams = toml::Value::Table(table).try_into().unwrap();
        assert_eq!(params.lookback_period, 20);
        assert_eq!(params.entry_zscore, 2.5);
    }

    #[test]
    fn rejects_unknown_spread_type() {
        let mut params = PairsArbParams::default();
        params.spread_type = "volume_weighted".to_string();
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_zero_lookback_period() {
        let mut params = PairsArbParams::default();
        params.lookback_period = 0;
        assert!(params.validate().is_err());
    }
}
