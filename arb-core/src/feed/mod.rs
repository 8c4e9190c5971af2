//! External-interface boundary traits (§6): market data, the order
//! router, and the shared-memory `tValue`/`tCache` override segments. Each
//! trait ships an in-memory test double; the shared-memory segment also
//! ships a `memmap2`-backed implementation standing in for the real
//! transport, consistent with the reference deployment's own preference
//! for shared memory over a message bus on the hot path.

pub mod router;
pub mod shared_value;
pub mod source;

pub use router::{InMemoryOrderRouter, OrderRequest, OrderResponse, OrderRouter};
pub use shared_value::{MmapSharedValueStore, SharedValueStore, TestSharedValueStore};
pub use source::{ChannelMarketDataSource, MarketDataSource};
