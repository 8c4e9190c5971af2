//! Position snapshot file (§6): JSON document persisted by an external
//! collaborator in production, but the engine owns both serialization and
//! deserialization so the round-trip property (§8) is directly testable
//! in-process.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    #[serde(rename = "strategyID")]
    pub strategy_id: u64,
    pub timestamp: u64,
    #[serde(rename = "symbolsPosition")]
    pub symbols_position: HashMap<String, Decimal>,
    #[serde(rename = "symbolsYesterdayPosition", skip_serializing_if = "Option::is_none")]
    pub symbols_yesterday_position: Option<HashMap<String, Decimal>>,
    #[serde(rename = "totalLongQty")]
    pub total_long_qty: Decimal,
    #[serde(rename = "totalShortQty")]
    pub total_short_qty: Decimal,
    #[serde(rename = "totalNetQty")]
    pub total_net_qty: Decimal,
    #[serde(rename = "avgLongPrice")]
    pub avg_long_price: Decimal,
    #[serde(rename = "avgShortPrice")]
    pub avg_short_price: Decimal,
    #[serde(rename = "realizedPnL")]
    pub realized_pnl: Decimal,
}

impl PositionSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(io::Error::other)
    }
}
