use aggregate::AggregationEngine;
use chrono::{DateTime, Utc};
use runner::{FailureStage, TaskResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::stats::{mean, percentile};

/// Batch-level metrics, computed once after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,

    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// `succeeded / submitted`, `0.0` for an empty batch.
    pub success_rate: f64,
    pub tasks_per_minute: f64,

    /// Mean over succeeded tasks only.
    pub average_quality_score: f64,
    pub total_entity_mentions: usize,
    /// Filled from the entity index when one is available.
    pub unique_entities: Option<usize>,

    pub total_attempts: u64,
    pub failures_by_stage: BTreeMap<FailureStage, usize>,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
}

/// Derives [`RunMetrics`] from a finished batch. No I/O and deterministic:
/// `run_id` is nil until [`RunMetrics::with_run_id`] sets it.
pub fn report(results: &[TaskResult], start: DateTime<Utc>, end: DateTime<Utc>) -> RunMetrics {
    let mut succeeded = 0;
    let mut failed = 0;
    let mut cancelled = 0;
    let mut quality = Vec::new();
    let mut latencies = Vec::new();
    let mut total_entity_mentions = 0;
    let mut total_attempts = 0u64;
    let mut failures_by_stage = BTreeMap::new();

    for result in results {
        if let Some(diagnostics) = result.diagnostics() {
            total_attempts += u64::from(diagnostics.attempts);
            latencies.push(diagnostics.elapsed_ms as f64);
        }

        match result {
            TaskResult::Success { record, .. } => {
                succeeded += 1;
                quality.push(record.quality_score);
                total_entity_mentions += record.biomarkers.len();
            }
            TaskResult::Failure { stage, .. } => {
                failed += 1;
                *failures_by_stage.entry(*stage).or_insert(0) += 1;
            }
            TaskResult::Cancelled { .. } => cancelled += 1,
        }
    }

    latencies.sort_by(|a, b| a.total_cmp(b));

    let submitted = results.len();
    let duration_secs = (end - start).num_milliseconds().max(0) as f64 / 1000.0;
    let tasks_per_minute = if duration_secs > 0.0 {
        (succeeded + failed) as f64 / (duration_secs / 60.0)
    } else {
        0.0
    };
    let success_rate = if submitted > 0 {
        succeeded as f64 / submitted as f64
    } else {
        0.0
    };

    RunMetrics {
        run_id: Uuid::nil(),
        started_at: start,
        finished_at: end,
        duration_secs,
        submitted,
        succeeded,
        failed,
        cancelled,
        success_rate,
        tasks_per_minute,
        average_quality_score: mean(&quality),
        total_entity_mentions,
        unique_entities: None,
        total_attempts,
        failures_by_stage,
        p50_latency_ms: percentile(&latencies, 50),
        p95_latency_ms: percentile(&latencies, 95),
    }
}

impl RunMetrics {
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_index(mut self, engine: &AggregationEngine) -> Self {
        self.unique_entities = Some(engine.len());
        self
    }
}

impl fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: {}/{} succeeded ({:.1}%), {} failed, {} cancelled in {:.1}s ({:.1}/min), avg quality {:.2}, {} entity mentions",
            self.run_id,
            self.succeeded,
            self.submitted,
            self.success_rate * 100.0,
            self.failed,
            self.cancelled,
            self.duration_secs,
            self.tasks_per_minute,
            self.average_quality_score,
            self.total_entity_mentions,
        )?;
        if let Some(unique) = self.unique_entities {
            write!(f, " ({unique} unique)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use extract::{EntityAssociation, ExtractionRecord, ProviderConfig};
    use runner::{Diagnostics, TaskInput};

    fn input(id: &str) -> TaskInput {
        TaskInput::new(id, id, ProviderConfig::default())
    }

    fn diagnostics(attempts: u32, elapsed_ms: u64) -> Diagnostics {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Diagnostics {
            attempts,
            elapsed_ms,
            started_at: at,
            finished_at: at,
        }
    }

    fn success(id: &str, quality: f64, entities: usize, elapsed_ms: u64) -> TaskResult {
        TaskResult::Success {
            input: input(id),
            record: ExtractionRecord {
                quality_score: quality,
                biomarkers: (0..entities)
                    .map(|i| EntityAssociation::new(format!("M{i}"), &["x"], "causal", "rct"))
                    .collect(),
                ..Default::default()
            },
            diagnostics: diagnostics(1, elapsed_ms),
        }
    }

    fn failure(id: &str, stage: FailureStage, attempts: u32) -> TaskResult {
        TaskResult::Failure {
            input: input(id),
            stage,
            message: "boom".to_string(),
            retryable: attempts > 1,
            diagnostics: diagnostics(attempts, 40),
        }
    }

    #[test]
    fn test_report_counts_and_rates() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let end = start + Duration::seconds(120);
        let results = vec![
            success("a", 0.8, 3, 10),
            success("b", 0.6, 1, 20),
            failure("c", FailureStage::RemoteCall, 3),
            failure("d", FailureStage::Parse, 1),
            TaskResult::Cancelled { input: input("e") },
        ];

        let metrics = report(&results, start, end);

        assert_eq!(metrics.submitted, 5);
        assert_eq!(metrics.succeeded, 2);
        assert_eq!(metrics.failed, 2);
        assert_eq!(metrics.cancelled, 1);
        assert!((metrics.success_rate - 0.4).abs() < 1e-9);
        assert!((metrics.tasks_per_minute - 2.0).abs() < 1e-9);
        assert!((metrics.average_quality_score - 0.7).abs() < 1e-9);
        assert_eq!(metrics.total_entity_mentions, 4);
        assert_eq!(metrics.total_attempts, 6);
        assert_eq!(metrics.failures_by_stage[&FailureStage::RemoteCall], 1);
        assert_eq!(metrics.failures_by_stage[&FailureStage::Parse], 1);
        assert_eq!(metrics.p50_latency_ms, 40.0);
        assert_eq!(metrics.unique_entities, None);
    }

    #[test]
    fn test_report_is_deterministic() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let end = start + Duration::seconds(30);
        let results = vec![success("a", 0.5, 1, 10), failure("b", FailureStage::Fetch, 1)];

        let first = report(&results, start, end);
        assert_eq!(first, report(&results, start, end));
        assert!(first.run_id.is_nil());

        let run_id = Uuid::new_v4();
        assert_eq!(first.with_run_id(run_id).run_id, run_id);
    }

    #[test]
    fn test_empty_batch() {
        let now = Utc::now();
        let metrics = report(&[], now, now);

        assert_eq!(metrics.submitted, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.tasks_per_minute, 0.0);
        assert_eq!(metrics.average_quality_score, 0.0);
        assert_eq!(metrics.p95_latency_ms, 0.0);
    }

    #[test]
    fn test_unique_entities_from_index() {
        let results = vec![success("a", 1.0, 2, 5)];
        let engine = AggregationEngine::from_results(&results);
        let now = Utc::now();

        let metrics = report(&results, now, now).with_index(&engine);
        assert_eq!(metrics.unique_entities, Some(2));
        assert!(metrics.to_string().contains("(2 unique)"));
    }

    #[test]
    fn test_metrics_serialize_stage_keys() {
        let now = Utc::now();
        let metrics = report(&[failure("a", FailureStage::RemoteCall, 3)], now, now);

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["failures_by_stage"]["remote-call"], 1);
        assert_eq!(json["failed"], 1);
    }
}
