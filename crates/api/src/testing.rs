use async_trait::async_trait;
use extract::{LlmError, ProviderConfig, Summarizer};
use std::sync::Mutex;

pub const BRCA_RESPONSE: &str = r#"```json
{"title": "BRCA1 variants in hereditary breast cancer",
 "authors": ["A. Researcher"],
 "biomarkers": [{"name": "BRCA-1", "diseases": ["Breast Cancer"], "association_type": "causal", "evidence_level": "cohort"}]}
```"#;

/// Replays canned responses in order and records the prompts it saw.
pub struct ScriptedSummarizer {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedSummarizer {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers every prompt with the same response.
    pub fn always(response: &str) -> Self {
        Self::new((0..64).map(|_| Ok(response.to_string())).collect())
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn generate(&self, prompt: &str, _config: &ProviderConfig) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Envelope("no scripted response left".to_string()));
        }
        responses.remove(0)
    }
}
