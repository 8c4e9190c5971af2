//! File I/O for the two on-disk formats the engine owns end to end (§6):
//! the daily-init text matrix and the position-snapshot JSON document. The
//! engine performs both serialization and deserialization itself so the
//! round-trip property in the testable-scenarios section is directly
//! exercisable in-process, without a second process to collaborate with.

pub mod daily_init;
pub mod snapshot;

pub use daily_init::{DailyInitRow, DailyInitTable};
pub use snapshot::PositionSnapshot;
