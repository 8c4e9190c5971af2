//! Foundational value types: order identifiers, side/status enums, the §7
//! error taxonomy, and fixed-point conversions at the market-data boundary.

pub mod errors;
pub mod types;

pub use errors::{EngineError, FillError, RiskTripKind};
pub use types::{fixed_point, HitType, OrderId, OrderStatus, OrderType, Side};
