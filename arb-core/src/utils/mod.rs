pub mod logger;
pub mod metrics;

pub use logger::init_logger;
pub use metrics::{serve as serve_metrics, MetricsCollector};
