use thiserror::Error;

/// Batch configuration problems, reported before any unit starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("concurrency must be between {min} and {max}, got {got}")]
    Concurrency { got: usize, min: usize, max: usize },

    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("min backoff ({min_ms}ms) exceeds max backoff ({max_ms}ms)")]
    BackoffRange { min_ms: u64, max_ms: u64 },

    #[error("backoff multiplier must be a positive number, got {0}")]
    Multiplier(f64),
}
