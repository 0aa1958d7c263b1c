pub mod llm;
pub mod normalizer;
pub mod parse;
pub mod prompt;
pub mod quality;
pub mod schema;

pub use llm::{LlmError, OllamaClient, ProviderConfig, Summarizer};
pub use normalizer::{canonical_key, normalize};
pub use parse::{ParseError, parse_extraction};
pub use quality::{QualityReport, QualityValidator};
pub use schema::{EntityAssociation, ExtractionRecord, Provenance};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Remote(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Prompts a summarization backend and parses what comes back.
#[derive(Clone)]
pub struct Extractor {
    summarizer: Arc<dyn Summarizer>,
}

impl Extractor {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }

    /// Extract a structured record from (a chunk of) paper text.
    ///
    /// `part` is `(index, total)` when the paper was split into chunks.
    pub async fn extract_from_text(
        &self,
        text: &str,
        part: Option<(usize, usize)>,
        config: &ProviderConfig,
    ) -> Result<ExtractionRecord, ExtractError> {
        let prompt = prompt::build_extraction_prompt(text, part);

        let response = self.summarizer.generate(&prompt, config).await?;
        debug!(model = %config.model, chars = response.len(), "received extraction response");

        Ok(parse_extraction(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl Summarizer for Canned {
        async fn generate(&self, prompt: &str, _config: &ProviderConfig) -> Result<String, LlmError> {
            assert!(prompt.contains("paper body"));
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_extract_from_text() {
        let extractor = Extractor::new(Arc::new(Canned(
            r#"{"title": "Canned paper", "biomarkers": [{"name": "TP53", "diseases": ["glioma"]}]}"#,
        )));

        let record = extractor
            .extract_from_text("paper body", None, &ProviderConfig::default())
            .await
            .unwrap();

        assert_eq!(record.title, "Canned paper");
        assert_eq!(record.biomarkers[0].name, "TP53");
    }

    #[tokio::test]
    async fn test_malformed_response_is_parse_error() {
        let extractor = Extractor::new(Arc::new(Canned("not json")));
        let err = extractor
            .extract_from_text("paper body", None, &ProviderConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
