use chrono::{DateTime, Utc};
use extract::{ExtractionRecord, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One document to process, plus the provider settings to process it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    /// Identifier the aggregation step attributes evidence to.
    pub document_id: String,
    pub location: PathBuf,
    pub provider: ProviderConfig,
}

impl TaskInput {
    pub fn new(document_id: impl Into<String>, location: impl Into<PathBuf>, provider: ProviderConfig) -> Self {
        Self {
            document_id: document_id.into(),
            location: location.into(),
            provider,
        }
    }

    /// Uses the file name as the document id.
    pub fn from_path(path: &Path, provider: ProviderConfig) -> Self {
        let document_id = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self::new(document_id, path, provider)
    }
}

/// Pipeline stage a unit failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    Fetch,
    Extract,
    RemoteCall,
    Parse,
    /// Quality scoring never fails a unit; kept so the taxonomy is complete.
    Validate,
    /// The unit panicked, in the worker or in a quality check.
    Internal,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Fetch => "fetch",
            FailureStage::Extract => "extract",
            FailureStage::RemoteCall => "remote-call",
            FailureStage::Parse => "parse",
            FailureStage::Validate => "validate",
            FailureStage::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error a worker returns for one attempt.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {message}")]
pub struct TaskError {
    pub stage: FailureStage,
    pub message: String,
    pub retryable: bool,
}

impl TaskError {
    /// Transient failure; the runner will try again.
    pub fn retryable(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            retryable: true,
        }
    }

    /// Same input, same failure; surfaced without retrying.
    pub fn fatal(stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            retryable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of one [`TaskInput`]. Exactly one is produced per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskResult {
    Success {
        input: TaskInput,
        record: ExtractionRecord,
        diagnostics: Diagnostics,
    },
    Failure {
        input: TaskInput,
        stage: FailureStage,
        message: String,
        /// `true` when the unit gave up after retrying, `false` when the
        /// failure was never retryable.
        retryable: bool,
        diagnostics: Diagnostics,
    },
    /// Never started because the batch was cancelled.
    Cancelled { input: TaskInput },
}

impl TaskResult {
    pub fn input(&self) -> &TaskInput {
        match self {
            TaskResult::Success { input, .. }
            | TaskResult::Failure { input, .. }
            | TaskResult::Cancelled { input } => input,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.input().document_id
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    pub fn record(&self) -> Option<&ExtractionRecord> {
        match self {
            TaskResult::Success { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            TaskResult::Success { diagnostics, .. } | TaskResult::Failure { diagnostics, .. } => {
                Some(diagnostics)
            }
            TaskResult::Cancelled { .. } => None,
        }
    }
}
