use aggregate::AggregationEngine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use extract::Summarizer;
use ingest::DocumentSource;
use report::RunMetrics;
use runner::{Progress, ProgressSnapshot};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::sinks::WrittenFiles;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<dyn DocumentSource>,
    pub summarizer: Arc<dyn Summarizer>,
    pub runs: Arc<DashMap<Uuid, RunState>>,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn DocumentSource>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            config: Arc::new(config),
            source,
            summarizer,
            runs: Arc::new(DashMap::new()),
        }
    }
}

/// Lifecycle of one batch started over HTTP.
#[derive(Clone)]
pub enum RunState {
    Running {
        started_at: DateTime<Utc>,
        progress: Arc<Progress>,
    },
    Completed(Arc<CompletedRun>),
    Failed {
        error: String,
    },
}

/// Frozen outputs of a finished run. Never mutated after insertion.
pub struct CompletedRun {
    pub engine: AggregationEngine,
    pub metrics: RunMetrics,
    pub files: WrittenFiles,
}

/// What `GET /runs/:id` returns.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunView {
    Running {
        run_id: Uuid,
        started_at: DateTime<Utc>,
        progress: ProgressSnapshot,
    },
    Completed {
        run_id: Uuid,
        metrics: RunMetrics,
        files: WrittenFiles,
    },
    Failed {
        run_id: Uuid,
        error: String,
    },
}

impl RunState {
    pub fn view(&self, run_id: Uuid) -> RunView {
        match self {
            RunState::Running {
                started_at,
                progress,
            } => RunView::Running {
                run_id,
                started_at: *started_at,
                progress: progress.snapshot(),
            },
            RunState::Completed(run) => RunView::Completed {
                run_id,
                metrics: run.metrics.clone(),
                files: run.files.clone(),
            },
            RunState::Failed { error } => RunView::Failed {
                run_id,
                error: error.clone(),
            },
        }
    }
}
