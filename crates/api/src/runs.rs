use aggregate::AggregationEngine;
use chrono::{DateTime, Utc};
use ingest::FileReader;
use runner::{BatchHandle, RunnerConfig, TaskInput, TaskRunner};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::sinks;
use crate::state::{AppState, CompletedRun, RunState};
use crate::worker::PaperWorker;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("{0}")]
    Config(String),

    #[error("cannot list documents: {0}")]
    Documents(#[from] ingest::ReadError),
}

/// Accepted run, as reported back to the caller.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartedRun {
    pub run_id: Uuid,
    pub documents: usize,
}

/// Lists the documents in `papers_dir`, starts a batch over them and
/// registers it. The batch finishes in the background.
pub async fn start_run(
    state: &AppState,
    papers_dir: &Path,
    runner_config: RunnerConfig,
) -> Result<StartedRun, StartError> {
    let runner = TaskRunner::new(runner_config).map_err(|e| StartError::Config(e.to_string()))?;
    let paths = FileReader::list_directory(papers_dir).await?;

    let tasks: Vec<TaskInput> = paths
        .iter()
        .map(|path| TaskInput::from_path(path, state.config.provider.clone()))
        .collect();
    let documents = tasks.len();

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let worker = Arc::new(PaperWorker::new(
        Arc::clone(&state.source),
        Arc::clone(&state.summarizer),
    ));

    info!(%run_id, documents, dir = %papers_dir.display(), "starting run");
    let handle = runner.spawn(tasks, worker);

    state.runs.insert(
        run_id,
        RunState::Running {
            started_at,
            progress: handle.progress(),
        },
    );

    let span = info_span!("run", run_id = %run_id);
    tokio::spawn(finish_run(state.clone(), run_id, started_at, handle).instrument(span));

    Ok(StartedRun { run_id, documents })
}

/// Waits for every result, folds them into the entity index, derives
/// metrics and persists outputs.
async fn finish_run(state: AppState, run_id: Uuid, started_at: DateTime<Utc>, handle: BatchHandle) {
    let results = handle.collect().await;
    let finished_at = Utc::now();

    let engine = AggregationEngine::from_results(&results);
    let metrics = report::report(&results, started_at, finished_at)
        .with_index(&engine)
        .with_run_id(run_id);
    info!("{metrics}");

    let output_dir = state.config.output_dir.join(run_id.to_string());
    let next = match sinks::write_run(&output_dir, &results, &engine, &metrics).await {
        Ok(files) => RunState::Completed(Arc::new(CompletedRun {
            engine,
            metrics,
            files,
        })),
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to persist run outputs");
            RunState::Failed {
                error: format!("{e:#}"),
            }
        }
    };

    state.runs.insert(run_id, next);
}
