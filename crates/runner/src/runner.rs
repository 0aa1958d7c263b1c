use chrono::Utc;
use extract::QualityValidator;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::cancel::CancellationToken;
use crate::config::RunnerConfig;
use crate::error::ConfigError;
use crate::progress::Progress;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::task::{Diagnostics, FailureStage, TaskError, TaskInput, TaskResult};
use crate::worker::Worker;

/// Drives a batch of independent units through a bounded worker pool.
///
/// Every input yields exactly one [`TaskResult`]: a failing or panicking
/// unit becomes a `Failure`, a unit that never started because of
/// cancellation becomes `Cancelled`.
pub struct TaskRunner {
    config: RunnerConfig,
    policy: Arc<RetryPolicy>,
    validator: Arc<QualityValidator>,
    cancel: CancellationToken,
}

/// Handle on a batch started with [`TaskRunner::spawn`].
pub struct BatchHandle {
    results: mpsc::Receiver<TaskResult>,
    progress: Arc<Progress>,
    cancel: CancellationToken,
}

#[derive(Clone)]
struct UnitContext {
    policy: Arc<RetryPolicy>,
    validator: Arc<QualityValidator>,
    progress: Arc<Progress>,
    results: mpsc::Sender<TaskResult>,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            policy: Arc::new(RetryPolicy::from_config(&config.retry)),
            validator: Arc::new(QualityValidator::default()),
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn with_validator(mut self, validator: QualityValidator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs the whole batch and returns its results in completion order.
    pub async fn run<W: Worker>(&self, tasks: Vec<TaskInput>, worker: Arc<W>) -> Vec<TaskResult> {
        self.spawn(tasks, worker).collect().await
    }

    /// Starts the batch in the background. Results can be consumed as they
    /// complete. Must be called from within a tokio runtime.
    pub fn spawn<W: Worker>(&self, tasks: Vec<TaskInput>, worker: Arc<W>) -> BatchHandle {
        let progress = Progress::new(tasks.len());
        let (tx, rx) = mpsc::channel(tasks.len().max(1));

        let ctx = UnitContext {
            policy: Arc::clone(&self.policy),
            validator: Arc::clone(&self.validator),
            progress: Arc::clone(&progress),
            results: tx,
        };

        tokio::spawn(drive(
            tasks,
            worker,
            self.config.concurrency,
            self.cancel.clone(),
            ctx,
        ));

        BatchHandle {
            results: rx,
            progress,
            cancel: self.cancel.clone(),
        }
    }
}

impl BatchHandle {
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Stop starting new units; running ones finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next finished unit, or `None` once every input is accounted for.
    pub async fn next(&mut self) -> Option<TaskResult> {
        self.results.recv().await
    }

    pub async fn collect(mut self) -> Vec<TaskResult> {
        let mut results = Vec::with_capacity(self.progress.snapshot().submitted);
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }
}

async fn drive<W: Worker>(
    tasks: Vec<TaskInput>,
    worker: Arc<W>,
    concurrency: usize,
    cancel: CancellationToken,
    ctx: UnitContext,
) {
    let total = tasks.len();
    info!(tasks = total, concurrency, "starting batch");

    let slots = Arc::new(Semaphore::new(concurrency));
    let mut units = JoinSet::new();
    let mut pending = tasks.into_iter();

    while let Some(input) = pending.next() {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(permit) if !cancel.is_cancelled() => permit,
            _ => {
                let skipped = std::iter::once(input).chain(pending.by_ref());
                let count = cancel_all(skipped, &ctx).await;
                info!(skipped = count, "batch cancelled, not starting remaining units");
                break;
            }
        };

        ctx.progress.record_start();
        let span = info_span!("task", document = %input.document_id);
        let worker = Arc::clone(&worker);
        let ctx = ctx.clone();

        units.spawn(
            async move {
                let result = execute_unit(input, worker.as_ref(), &ctx).await;
                drop(permit);
                ctx.progress.record_result(&result);
                // the consumer may have stopped listening; the batch still finishes
                let _ = ctx.results.send(result).await;
            }
            .instrument(span),
        );
    }

    while let Some(joined) = units.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "task runner unit aborted");
        }
    }

    let summary = ctx.progress.snapshot();
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        attempts = summary.attempts,
        "batch finished"
    );
}

async fn cancel_all(inputs: impl Iterator<Item = TaskInput>, ctx: &UnitContext) -> usize {
    let mut count = 0;
    for input in inputs {
        let result = TaskResult::Cancelled { input };
        ctx.progress.record_result(&result);
        let _ = ctx.results.send(result).await;
        count += 1;
    }
    count
}

async fn execute_unit<W: Worker>(input: TaskInput, worker: &W, ctx: &UnitContext) -> TaskResult {
    let started_at = Utc::now();
    let clock = Instant::now();
    let attempts = AtomicU32::new(0);

    let outcome = {
        let input = &input;
        let attempts = &attempts;
        // caller-supplied quality checks run inside the unwind boundary too
        AssertUnwindSafe(async move {
            let mut outcome = ctx
                .policy
                .retry_if(
                    &input.document_id,
                    |e: &TaskError| e.retryable,
                    move |attempt| {
                        attempts.store(attempt, Ordering::Relaxed);
                        worker.process(input)
                    },
                )
                .await;
            if let Ok(record) = outcome.result.as_mut() {
                ctx.validator.apply(record);
            }
            outcome
        })
        .catch_unwind()
        .await
    };

    let diagnostics = |attempts: u32| Diagnostics {
        attempts,
        elapsed_ms: clock.elapsed().as_millis() as u64,
        started_at,
        finished_at: Utc::now(),
    };

    match outcome {
        Ok(RetryOutcome {
            result: Ok(record),
            attempts,
            ..
        }) => {
            debug!(attempts, quality = record.quality_score, entities = record.biomarkers.len(), "task succeeded");
            TaskResult::Success {
                input,
                record,
                diagnostics: diagnostics(attempts),
            }
        }
        Ok(RetryOutcome {
            result: Err(err),
            attempts,
            ..
        }) => {
            warn!(stage = %err.stage, attempts, retryable = err.retryable, error = %err.message, "task failed");
            TaskResult::Failure {
                input,
                stage: err.stage,
                message: err.message,
                retryable: err.retryable,
                diagnostics: diagnostics(attempts),
            }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(error = %message, "unit panicked");
            TaskResult::Failure {
                input,
                stage: FailureStage::Internal,
                message: format!("unit panicked: {message}"),
                retryable: false,
                diagnostics: diagnostics(attempts.load(Ordering::Relaxed)),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::worker::worker_fn;
    use extract::{ExtractionRecord, ProviderConfig};

    fn inputs(n: usize) -> Vec<TaskInput> {
        (0..n)
            .map(|i| TaskInput::new(format!("paper{i}.txt"), format!("papers/paper{i}.txt"), ProviderConfig::default()))
            .collect()
    }

    fn fast_runner(concurrency: usize) -> TaskRunner {
        let config = RunnerConfig::default()
            .with_concurrency(concurrency)
            .with_retry(RetryConfig::immediate(3));
        TaskRunner::new(config).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_concurrency() {
        assert!(TaskRunner::new(RunnerConfig::default().with_concurrency(0)).is_err());
        assert!(TaskRunner::new(RunnerConfig::default().with_concurrency(21)).is_err());
    }

    #[tokio::test]
    async fn test_success_is_quality_scored() {
        let worker = Arc::new(worker_fn(|input: TaskInput| async move {
            Ok::<_, TaskError>(ExtractionRecord {
                title: format!("Study of {}", input.document_id),
                ..Default::default()
            })
        }));

        let results = fast_runner(2).run(inputs(1), worker).await;
        let TaskResult::Success { record, diagnostics, .. } = &results[0] else {
            panic!("expected success, got {:?}", results[0]);
        };

        assert_eq!(diagnostics.attempts, 1);
        assert_eq!(record.quality_checks.len(), 7);
        assert_eq!(record.quality_checks["has_title"], true);
        assert!((record.quality_score - 1.0 / 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let worker = Arc::new(worker_fn(|_input: TaskInput| async move {
            Ok::<_, TaskError>(ExtractionRecord::default())
        }));
        assert!(fast_runner(1).run(Vec::new(), worker).await.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_worker_becomes_failure() {
        let worker = Arc::new(worker_fn(|input: TaskInput| async move {
            if input.document_id == "paper1.txt" {
                panic!("extractor blew up");
            }
            Ok::<_, TaskError>(ExtractionRecord::default())
        }));

        let results = fast_runner(2).run(inputs(3), worker).await;
        assert_eq!(results.len(), 3);

        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        match failed[0] {
            TaskResult::Failure { input, stage, message, retryable, .. } => {
                assert_eq!(input.document_id, "paper1.txt");
                assert_eq!(*stage, FailureStage::Internal);
                assert!(message.contains("extractor blew up"));
                assert!(!retryable);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_progress_tracks_batch() {
        let worker = Arc::new(worker_fn(|input: TaskInput| async move {
            if input.document_id == "paper0.txt" {
                Err(TaskError::fatal(FailureStage::Extract, "not text"))
            } else {
                Ok(ExtractionRecord::default())
            }
        }));

        let handle = fast_runner(3).spawn(inputs(4), worker);
        let progress = handle.progress();
        let results = handle.collect().await;
        let snapshot = progress.snapshot();

        assert_eq!(results.len(), 4);
        assert!(snapshot.is_done());
        assert_eq!(snapshot.succeeded, 3);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.attempts, 4);
    }
}
