//! Configuration loading (§6, SPEC_FULL item 7).
//!
//! [`ProcessConfig`] is cold-path, process-wide settings loaded once via
//! the `config` crate: a TOML file overlaid with `ARB_`-prefixed
//! environment variables (double underscore separates nested fields, e.g.
//! `ARB_METRICS__LISTEN_ADDR`). [`StrategyConfig`] is the §6 per-strategy
//! schema, one TOML/JSON document per hosted instance; [`StrategyConfigLoader`]
//! re-reads and re-validates that document on demand for hot reload,
//! leaving the prior value in place on any validation failure (§7
//! `ConfigError`).

pub mod types;

pub use types::{MetricsConfig, ProcessConfig, StrategyConfig, TransportConfig};

use anyhow::{Context, Result};
use config::{Config as ConfigSource, Environment, File};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Env-var prefix for [`ProcessConfig`] overrides (§6 "Environment
/// Variable Examples", generalized from the reference deployment's own
/// `BOG_`-prefixed convention).
pub const ENV_PREFIX: &str = "ARB";

impl ProcessConfig {
    /// Load from `path`, overlaid with `ARB_`-prefixed environment
    /// variables, then validate (§7: invalid config is rejected, not
    /// silently coerced).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = ConfigSource::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("building config from {}", path.as_ref().display()))?;
        let cfg: ProcessConfig = source
            .try_deserialize()
            .context("deserializing ProcessConfig")?;
        cfg.validate().context("validating ProcessConfig")?;
        Ok(cfg)
    }

    /// Defaults overlaid with environment only (no file) — the common
    /// case for demo/test binaries that don't ship a config file.
    pub fn load_env_only() -> Result<Self> {
        let source = ConfigSource::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("building env-only config")?;
        let cfg: ProcessConfig = source.try_deserialize().unwrap_or_default();
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Hot-reloadable holder for one strategy's §6 config document. `reload`
/// re-reads the file, validates, and only then swaps — a failed reload
/// leaves strategies reading the prior (still-valid) config, per the
/// `ConfigError` propagation rule in §7.
pub struct StrategyConfigLoader {
    path: PathBuf,
    current: RwLock<Arc<StrategyConfig>>,
}

impl StrategyConfigLoader {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let initial = Self::read_and_validate(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(initial)),
        })
    }

    pub fn current(&self) -> Arc<StrategyConfig> {
        self.current.read().clone()
    }

    /// Re-read and validate; on success, swap; on failure, leave the prior
    /// config untouched and return the error for the caller to log.
    pub fn reload(&self) -> Result<Arc<StrategyConfig>> {
        let next = Self::read_and_validate(&self.path)?;
        let next = Arc::new(next);
        *self.current.write() = next.clone();
        Ok(next)
    }

    fn read_and_validate(path: &Path) -> Result<StrategyConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading strategy config {}", path.display()))?;
        let cfg: StrategyConfig = parse_toml_or_json(&text)
            .with_context(|| format!("parsing strategy config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// §6: "TOML/JSON document" — try TOML first (the house default), fall
/// back to JSON so either extension works without the caller needing to
/// specify a format.
fn parse_toml_or_json(text: &str) -> Result<StrategyConfig> {
    match toml::from_str::<StrategyConfig>(text) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str::<StrategyConfig>(text)
            .with_context(|| format!("not valid TOML ({toml_err}) or valid JSON")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn loads_and_validates_a_strategy_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        std::fs::write(
            &path,
            r#"
                strategyID = 1
                strategy_type = "pairs_arb"
                symbols = ["IF2412", "IH2412"]
                max_position_size = "100"
                enabled = true
                [parameters]
                entry_zscore = 2.0
            "#,
        )
        .unwrap();

        let loader = StrategyConfigLoader::load(&path).unwrap();
        assert_eq!(loader.current().strategy_id, 1);
        assert_eq!(loader.current().max_position_size, dec!(100));
    }

    #[test]
    fn reload_with_invalid_config_keeps_the_prior_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        std::fs::write(
            &path,
            r#"
                strategyID = 1
                strategy_type = "pairs_arb"
                symbols = ["IF2412"]
                max_position_size = "100"
            "#,
        )
        .unwrap();
        let loader = StrategyConfigLoader::load(&path).unwrap();

        // Rewrite with an invalid (empty symbols) document.
        std::fs::write(
            &path,
            r#"
                strategyID = 1
                strategy_type = "pairs_arb"
                symbols = []
                max_position_size = "100"
            "#,
        )
        .unwrap();
        assert!(loader.reload().is_err());
        // Prior value is retained.
        assert_eq!(loader.current().symbols, vec!["IF2412".to_string()]);
    }

    #[test]
    fn process_config_env_override_applies() {
        std::env::set_var("ARB_LOG_LEVEL", "debug");
        let cfg = ProcessConfig::load_env_only().unwrap();
        assert_eq!(cfg.log_level, "debug");
        std::env::remove_var("ARB_LOG_LEVEL");
    }
}
