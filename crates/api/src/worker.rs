use async_trait::async_trait;
use extract::{ExtractError, ExtractionRecord, Extractor, Provenance, Summarizer};
use ingest::{Chunker, DocumentSource, ReadError};
use runner::{FailureStage, TaskError, TaskInput, Worker};
use std::sync::Arc;
use tracing::debug;

/// Reads a paper, sends its first chunk to the summarizer and parses the
/// answer into an [`ExtractionRecord`].
pub struct PaperWorker {
    source: Arc<dyn DocumentSource>,
    extractor: Extractor,
}

impl PaperWorker {
    pub fn new(source: Arc<dyn DocumentSource>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            source,
            extractor: Extractor::new(summarizer),
        }
    }
}

#[async_trait]
impl Worker for PaperWorker {
    async fn process(&self, input: &TaskInput) -> Result<ExtractionRecord, TaskError> {
        let document = self
            .source
            .read(&input.location)
            .await
            .map_err(classify_read)?;

        if document.is_blank() {
            return Err(TaskError::fatal(FailureStage::Extract, "document contains no text"));
        }

        let chunks = Chunker::new(input.provider.max_chars_per_chunk).chunk_text(&document.text);
        let part = (chunks.len() > 1).then_some((1, chunks.len()));
        debug!(chunks = chunks.len(), pages = document.page_count, "document read");

        let first = chunks.first().map(String::as_str).unwrap_or(&document.text);
        let mut record = self
            .extractor
            .extract_from_text(first, part, &input.provider)
            .await
            .map_err(classify_extract)?;

        record.provenance = Some(Provenance {
            provider: input.provider.provider.clone(),
            model: input.provider.model.clone(),
            chunks_processed: chunks.len(),
            page_count: document.page_count,
            text_length: document.char_len(),
            fingerprint: document.fingerprint.clone(),
        });

        Ok(record)
    }
}

fn classify_read(err: ReadError) -> TaskError {
    if err.is_structural() {
        TaskError::fatal(FailureStage::Extract, err.to_string())
    } else if err.is_transient() {
        TaskError::retryable(FailureStage::Fetch, err.to_string())
    } else {
        TaskError::fatal(FailureStage::Fetch, err.to_string())
    }
}

fn classify_extract(err: ExtractError) -> TaskError {
    match err {
        ExtractError::Remote(e) if e.is_retryable() => {
            TaskError::retryable(FailureStage::RemoteCall, e.to_string())
        }
        ExtractError::Remote(e) => TaskError::fatal(FailureStage::RemoteCall, e.to_string()),
        ExtractError::Parse(e) => TaskError::fatal(FailureStage::Parse, e.to_string()),
    }
}
