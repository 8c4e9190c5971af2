//! Strategy implementations hosted by the `arb-core` engine.
//!
//! `pairs_arb` is the C6 strategy this runtime is built around: two
//! [`arb_core::PerLegBook`]s, one [`arb_core::domain::spread::SpreadAnalyzer`],
//! one [`arb_core::ThresholdSet`] and one [`arb_core::ControlState`],
//! composed behind the engine's [`arb_core::engine::Strategy`] trait
//! (§9) rather than inheriting from a shared execution base class.

pub mod params;
pub mod pairs_arb;

pub use pairs_arb::PairsArbStrategy;
pub use params::PairsArbParams;
