pub mod metrics;
pub mod stats;

pub use metrics::{RunMetrics, report};
pub use stats::{mean, percentile};
