pub mod cancel;
pub mod config;
pub mod error;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod task;
pub mod worker;

pub use cancel::CancellationToken;
pub use config::{MAX_CONCURRENCY, MIN_CONCURRENCY, RetryConfig, RunnerConfig};
pub use error::ConfigError;
pub use progress::{Progress, ProgressSnapshot};
pub use retry::{RetryOutcome, RetryPolicy};
pub use runner::{BatchHandle, TaskRunner};
pub use task::{Diagnostics, FailureStage, TaskError, TaskInput, TaskResult};
pub use worker::{FnWorker, Worker, worker_fn};
