use extract::ProviderConfig;
use runner::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub papers_dir: PathBuf,
    pub output_dir: PathBuf,
    pub bind_addr: String,
    pub ollama_url: String,
    pub request_timeout_secs: u64,
    pub min_papers_for_high_confidence: usize,
    pub runner: RunnerConfig,
    pub provider: ProviderConfig,
}

/// Every problem found while loading, reported together.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigProblems(pub Vec<String>);

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            papers_dir: PathBuf::from("project/papers"),
            output_dir: PathBuf::from("project/outputs"),
            bind_addr: "0.0.0.0:3000".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            request_timeout_secs: 120,
            min_papers_for_high_confidence: 2,
            runner: RunnerConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigProblems> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`, falling back to defaults for unset
    /// keys. Retry waits are given in whole seconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigProblems>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut problems = Vec::new();

        if let Some(dir) = lookup("PAPERS_DIR") {
            config.papers_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Some(model) = lookup("MODEL") {
            config.provider.model = model;
        }

        if let Some(v) = read(&lookup, "MAX_WORKERS", &mut problems) {
            config.runner.concurrency = v;
        }
        if let Some(v) = read(&lookup, "MAX_RETRIES", &mut problems) {
            config.runner.retry.max_attempts = v;
        }
        if let Some(secs) = read::<u64>(&lookup, "RETRY_MIN_WAIT", &mut problems) {
            config.runner.retry.min_backoff_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = read::<u64>(&lookup, "RETRY_MAX_WAIT", &mut problems) {
            config.runner.retry.max_backoff_ms = secs.saturating_mul(1000);
        }
        if let Some(v) = read(&lookup, "TEMPERATURE", &mut problems) {
            config.provider.temperature = v;
        }
        if let Some(v) = read(&lookup, "MAX_TOKENS", &mut problems) {
            config.provider.max_tokens = v;
        }
        if let Some(v) = read(&lookup, "MAX_CHARS_PER_CHUNK", &mut problems) {
            config.provider.max_chars_per_chunk = v;
        }
        if let Some(v) = read(&lookup, "MIN_PAPERS_FOR_HIGH_CONFIDENCE", &mut problems) {
            config.min_papers_for_high_confidence = v;
        }
        if let Some(v) = read(&lookup, "REQUEST_TIMEOUT_SECS", &mut problems) {
            config.request_timeout_secs = v;
        }

        problems.extend(config.validate());
        if problems.is_empty() {
            Ok(config)
        } else {
            Err(ConfigProblems(problems))
        }
    }

    /// Range checks; empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = self.runner.validate() {
            problems.push(e.to_string());
        }
        if !(0.0..=1.0).contains(&self.provider.temperature) {
            problems.push(format!(
                "TEMPERATURE must be between 0 and 1, got {}",
                self.provider.temperature
            ));
        }
        if self.provider.max_tokens == 0 {
            problems.push("MAX_TOKENS must be positive".to_string());
        }
        if self.provider.max_chars_per_chunk == 0 {
            problems.push("MAX_CHARS_PER_CHUNK must be positive".to_string());
        }
        if self.min_papers_for_high_confidence == 0 {
            problems.push("MIN_PAPERS_FOR_HIGH_CONFIDENCE must be at least 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            problems.push("REQUEST_TIMEOUT_SECS must be positive".to_string());
        }

        problems
    }

    /// Runner settings with the worker count overridden, checked against
    /// the allowed range.
    pub fn runner_with_workers(&self, workers: Option<usize>) -> Result<RunnerConfig, String> {
        let config = match workers {
            Some(n) => self.runner.clone().with_concurrency(n),
            None => self.runner.clone(),
        };
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Resolves a per-request papers directory. Only relative paths that
    /// stay below `papers_dir` are accepted.
    pub fn papers_subdir(&self, requested: Option<&Path>) -> Result<PathBuf, String> {
        let Some(requested) = requested else {
            return Ok(self.papers_dir.clone());
        };
        let contained = requested
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(format!(
                "papers_dir must be a relative path inside {}, got {}",
                self.papers_dir.display(),
                requested.display()
            ));
        }
        Ok(self.papers_dir.join(requested))
    }
}

fn read<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    problems: &mut Vec<String>,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            problems.push(format!("{key}: cannot parse {raw:?}"));
            None
        }
    }
}
