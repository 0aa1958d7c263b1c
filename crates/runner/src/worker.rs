use async_trait::async_trait;
use extract::ExtractionRecord;
use std::future::Future;

use crate::task::{TaskError, TaskInput};

/// Processes one unit of work. Called once per attempt.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    async fn process(&self, input: &TaskInput) -> Result<ExtractionRecord, TaskError>;
}

/// Adapts an async closure into a [`Worker`].
pub struct FnWorker<F> {
    f: F,
}

pub fn worker_fn<F, Fut>(f: F) -> FnWorker<F>
where
    F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExtractionRecord, TaskError>> + Send + 'static,
{
    FnWorker { f }
}

#[async_trait]
impl<F, Fut> Worker for FnWorker<F>
where
    F: Fn(TaskInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ExtractionRecord, TaskError>> + Send + 'static,
{
    async fn process(&self, input: &TaskInput) -> Result<ExtractionRecord, TaskError> {
        (self.f)(input.clone()).await
    }
}
