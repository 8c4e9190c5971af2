//! Configuration value types (§6 ambient config layer, SPEC_FULL §6).
//!
//! Two documents, loaded two different ways:
//!
//! - [`ProcessConfig`]: the process-wide cold-path settings (transport
//!   endpoints, metrics listen address, log level) — loaded once at
//!   startup via the `config` crate, layered TOML file + `ARB_` env
//!   overrides.
//! - [`StrategyConfig`]: the §6 per-strategy-instance schema — one
//!   TOML/JSON document per hosted strategy, loadable at startup and
//!   re-loadable at runtime (`ConfigLoader::reload`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Process-wide settings: where the market-data/order-router transport
/// lives, where the embedded Prometheus endpoint listens, and how
/// `tracing` should be configured (§6, SPEC_FULL item 5/9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "default_timer_interval_ms")]
    pub timer_interval_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            metrics: MetricsConfig::default(),
            log_level: default_log_level(),
            json_logs: false,
            timer_interval_ms: default_timer_interval_ms(),
        }
    }
}

/// The `md.<exchange>.<symbol>` / `order.>` / order-router boundary
/// addresses (§6). The engine only ever talks to these through the
/// `MarketDataSource`/`OrderRouter` traits; this struct is what a real
/// deployment's wiring code would point those implementations at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_market_data_subject")]
    pub market_data_subject: String,
    #[serde(default = "default_order_subject")]
    pub order_subject: String,
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            market_data_subject: default_market_data_subject(),
            order_subject: default_order_subject(),
            order_timeout_ms: default_order_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_metrics_addr(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_market_data_subject() -> String {
    "md.*.*".to_string()
}
fn default_order_subject() -> String {
    "order.>".to_string()
}
fn default_order_timeout_ms() -> u64 {
    50
}
fn default_metrics_addr() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_timer_interval_ms() -> u64 {
    1000
}

impl ProcessConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.transport.order_timeout_ms == 0 {
            anyhow::bail!("transport.order_timeout_ms must be > 0");
        }
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "invalid log_level '{}', must be one of {:?}",
                self.log_level,
                valid_log_levels
            );
        }
        if self.timer_interval_ms == 0 {
            anyhow::bail!("timer_interval_ms must be > 0");
        }
        Ok(())
    }
}

/// §6 strategy-config schema: `{strategyID, strategyType, symbols[],
/// exchanges[], maxPositionSize, maxExposure, enabled, parameters: map}`.
/// One document per hosted strategy instance, hot-reloadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "strategyID")]
    pub strategy_id: u64,
    pub strategy_type: String,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub exchanges: Vec<String>,
    pub max_position_size: Decimal,
    #[serde(default)]
    pub max_exposure: Decimal,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-form bag. Recognized keys for the pairs strategy are listed in
    /// §6; unrecognized keys are ignored (not an error) — callers read a
    /// typed view via [`StrategyConfig::parameters_as`], which tolerates
    /// them through `serde`'s default unknown-field behavior rather than
    /// `deny_unknown_fields`.
    #[serde(default)]
    pub parameters: toml::value::Table,
}

impl StrategyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbols.is_empty() {
            anyhow::bail!("strategy {}: symbols must not be empty", self.strategy_id);
        }
        if self.max_position_size <= Decimal::ZERO {
            anyhow::bail!("strategy {}: max_position_size must be > 0", self.strategy_id);
        }
        Ok(())
    }

    /// Deserialize `parameters` into the pairs-strategy's typed parameter
    /// struct (§6). A `ConfigError` here means the running strategy (if
    /// any) keeps its prior config (§7).
    pub fn parameters_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::core::EngineError> {
        toml::Value::Table(self.parameters.clone())
            .try_into()
            .map_err(|e| crate::core::EngineError::config(format!("strategy {}: {e}", self.strategy_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn strategy_config_parses_from_toml_with_unknown_parameters_ignored() {
        let toml_text = r#"
            strategyID = 1
            strategy_type = "pairs_arb"
            symbols = ["IF2412", "IH2412"]
            exchanges = ["CFFEX"]
            max_position_size = "100"
            max_exposure = "50"
            enabled = true

            [parameters]
            entry_zscore = 2.0
            exit_zscore = 0.5
            this_key_does_not_exist_in_any_schema = "ignored"
        "#;
        let cfg: StrategyConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(cfg.strategy_id, 1);
        assert_eq!(cfg.max_position_size, dec!(100));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_symbols_fails_validation() {
        let cfg = StrategyConfig {
            strategy_id: 1,
            strategy_type: "pairs_arb".to_string(),
            symbols: vec![],
            exchanges: vec![],
            max_position_size: dec!(100),
            max_exposure: dec!(0),
            enabled: true,
            parameters: toml::value::Table::new(),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn process_config_rejects_invalid_log_level() {
        let mut cfg = ProcessConfig::default();
        cfg.log_level = "verbose".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn process_config_defaults_are_valid() {
        assert!(ProcessConfig::default().validate().is_ok());
    }
}
