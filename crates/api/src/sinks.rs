use aggregate::AggregationEngine;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use report::RunMetrics;
use runner::TaskResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RESULTS_FILE: &str = "paper_summaries.json";
pub const RESULTS_CSV_FILE: &str = "paper_summaries.csv";

/// Files written for one run.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenFiles {
    pub results: PathBuf,
    pub results_csv: PathBuf,
    pub biomarkers: PathBuf,
    pub biomarkers_csv: PathBuf,
    pub metrics: PathBuf,
}

/// Writes per-paper results, the entity export and run metrics into
/// `output_dir`. Export and metrics file names carry the run's finish time.
pub async fn write_run(
    output_dir: &Path,
    results: &[TaskResult],
    engine: &AggregationEngine,
    metrics: &RunMetrics,
) -> Result<WrittenFiles> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let stamp = timestamp(metrics.finished_at);
    let files = WrittenFiles {
        results: output_dir.join(RESULTS_FILE),
        results_csv: output_dir.join(RESULTS_CSV_FILE),
        biomarkers: output_dir.join(format!("biomarkers_{stamp}.json")),
        biomarkers_csv: output_dir.join(format!("biomarkers_{stamp}.csv")),
        metrics: output_dir.join(format!("metrics_{stamp}.json")),
    };

    write_json(&files.results, results).await?;
    write_file(&files.results_csv, results_csv(results)?).await?;
    write_json(&files.biomarkers, &engine.export()).await?;

    let mut associations = Vec::new();
    let rows = engine
        .write_csv(&mut associations)
        .context("Failed to render biomarker associations")?;
    write_file(&files.biomarkers_csv, associations).await?;
    write_json(&files.metrics, metrics).await?;

    info!(dir = %output_dir.display(), association_rows = rows, "wrote run outputs");
    Ok(files)
}

/// Loads results saved by an earlier run.
pub async fn read_results(path: &Path) -> Result<Vec<TaskResult>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

/// One line of the per-paper spreadsheet.
#[derive(Debug, Default, Serialize)]
struct SummaryRow<'a> {
    filename: &'a str,
    status: &'static str,
    provider: &'a str,
    title: &'a str,
    authors: &'a str,
    year: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
    research_question: &'a str,
    methodology: &'a str,
    key_findings: String,
    conclusions: &'a str,
    limitations: &'a str,
    future_work: &'a str,
    quality_score: Option<f64>,
    biomarkers: usize,
    num_pages: Option<usize>,
    text_length: Option<usize>,
    chunks_processed: Option<usize>,
    error: String,
}

impl<'a> From<&'a TaskResult> for SummaryRow<'a> {
    fn from(result: &'a TaskResult) -> Self {
        let input = result.input();
        let base = SummaryRow {
            filename: &input.document_id,
            provider: &input.provider.provider,
            ..Default::default()
        };

        match result {
            TaskResult::Success { record, .. } => {
                let provenance = record.provenance.as_ref();
                SummaryRow {
                    status: "success",
                    title: &record.title,
                    authors: &record.authors,
                    year: &record.year,
                    abstract_text: &record.abstract_text,
                    research_question: &record.research_question,
                    methodology: &record.methodology,
                    key_findings: record.key_findings.join(" | "),
                    conclusions: &record.conclusions,
                    limitations: &record.limitations,
                    future_work: &record.future_work,
                    quality_score: Some(record.quality_score),
                    biomarkers: record.biomarkers.len(),
                    num_pages: provenance.map(|p| p.page_count),
                    text_length: provenance.map(|p| p.text_length),
                    chunks_processed: provenance.map(|p| p.chunks_processed),
                    ..base
                }
            }
            TaskResult::Failure { stage, message, .. } => SummaryRow {
                status: "failure",
                error: format!("{stage}: {message}"),
                ..base
            },
            TaskResult::Cancelled { .. } => SummaryRow {
                status: "cancelled",
                ..base
            },
        }
    }
}

fn results_csv(results: &[TaskResult]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut out = csv::Writer::from_writer(&mut buf);
    for result in results {
        out.serialize(SummaryRow::from(result))
            .with_context(|| format!("Failed to render row for {}", result.document_id()))?;
    }
    out.flush().context("Failed to flush paper summaries")?;
    drop(out);
    Ok(buf)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_file(path, json).await
}

async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use extract::{EntityAssociation, ExtractionRecord, ProviderConfig};
    use runner::{Diagnostics, FailureStage, TaskInput};

    fn sample_results() -> Vec<TaskResult> {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        vec![TaskResult::Success {
            input: TaskInput::new("paper1.txt", "papers/paper1.txt", ProviderConfig::default()),
            record: ExtractionRecord {
                title: "EGFR in lung cancer".to_string(),
                biomarkers: vec![EntityAssociation::new("EGFR", &["lung cancer"], "causal", "rct")],
                ..Default::default()
            },
            diagnostics: Diagnostics {
                attempts: 1,
                elapsed_ms: 12,
                started_at: at,
                finished_at: at,
            },
        }]
    }

    #[tokio::test]
    async fn test_writes_and_reloads_run() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample_results();
        let engine = AggregationEngine::from_results(&results);
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 9, 8, 31, 5).unwrap();
        let metrics = report::report(&results, start, end).with_index(&engine);

        let out = dir.path().join("outputs");
        let files = write_run(&out, &results, &engine, &metrics).await.unwrap();

        assert_eq!(files.results, out.join("paper_summaries.json"));
        assert_eq!(files.results_csv, out.join("paper_summaries.csv"));
        assert_eq!(files.biomarkers, out.join("biomarkers_20240309_083105.json"));
        assert_eq!(files.biomarkers_csv, out.join("biomarkers_20240309_083105.csv"));
        assert_eq!(files.metrics, out.join("metrics_20240309_083105.json"));

        let reloaded = read_results(&files.results).await.unwrap();
        assert_eq!(reloaded, results);

        let rebuilt = AggregationEngine::from_results(&reloaded).details("egfr").unwrap();
        let original = engine.details("EGFR").unwrap();
        assert_eq!(rebuilt.total_mentions, original.total_mentions);
        assert_eq!(rebuilt.disease_associations, original.disease_associations);
    }

    #[tokio::test]
    async fn test_csv_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = sample_results();
        let diagnostics = results[0].diagnostics().unwrap().clone();
        results.push(TaskResult::Failure {
            input: TaskInput::new("paper2.txt", "papers/paper2.txt", ProviderConfig::default()),
            stage: FailureStage::Parse,
            message: "no JSON object".to_string(),
            retryable: false,
            diagnostics,
        });
        let engine = AggregationEngine::from_results(&results);
        let now = Utc::now();
        let metrics = report::report(&results, now, now);

        let files = write_run(dir.path(), &results, &engine, &metrics).await.unwrap();

        let biomarkers = std::fs::read_to_string(&files.biomarkers_csv).unwrap();
        let lines: Vec<_> = biomarkers.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Biomarker,Disease,Paper Count"));
        assert!(lines[1].starts_with("EGFR,lung cancer,1,causal,rct,1,EGFR"));

        let mut summaries = csv::Reader::from_path(&files.results_csv).unwrap();
        let headers = summaries.headers().unwrap().clone();
        assert_eq!(&headers[0], "filename");
        assert_eq!(&headers[1], "status");
        let rows: Vec<csv::StringRecord> = summaries.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "paper1.txt");
        assert_eq!(&rows[0][3], "EGFR in lung cancer");
        assert_eq!(&rows[1][1], "failure");
        assert_eq!(rows[1].get(rows[1].len() - 1), Some("parse: no JSON object"));
    }

    #[tokio::test]
    async fn test_read_missing_results_has_context() {
        let err = read_results(Path::new("/nonexistent/paper_summaries.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
