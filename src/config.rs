// File: src/config.rs
// Engine and server configuration.

use crate::core::tokenizer::Script;
use crate::corpus::CorpusFormat;
use crate::error::{ChatError, Result};
use crate::generator::GenerationParams;
use crate::sampling::validate_temperature;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Model artifact. Its presence means training is skipped.
    pub model_path: PathBuf,
    pub corpus_path: PathBuf,
    pub corpus_format: CorpusFormat,
    /// Stop reading the corpus after this many pairs.
    pub max_pairs: usize,
    /// Context width. 3 for the persistent trigram model.
    pub order: usize,
    pub script: Script,
    pub max_len: usize,
    pub temperature: f64,
    /// Pause between streamed events.
    pub token_delay_ms: u64,
    /// Wall-clock cap on one streamed response.
    pub stream_timeout_ms: Option<u64>,
    pub bind: String,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("ngram_model.bin"),
            corpus_path: PathBuf::from("qa_pairs.txt"),
            corpus_format: CorpusFormat::Auto,
            max_pairs: 2_000_000,
            order: 3,
            script: Script::Hangul,
            max_len: 30,
            temperature: 0.8,
            token_delay_ms: 50,
            stream_timeout_ms: None,
            bind: "0.0.0.0:7860".to_string(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).map_err(|e| ChatError::io(e, Some(path.to_path_buf())))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(ChatError::InvalidConfig("order must be at least 1".into()));
        }
        if self.max_pairs == 0 {
            return Err(ChatError::InvalidConfig(
                "max_pairs must be greater than zero".into(),
            ));
        }
        validate_temperature(self.temperature)
            .map_err(|_| ChatError::InvalidConfig(format!(
                "temperature must be > 0, got {}",
                self.temperature
            )))?;
        Ok(())
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_len: self.max_len,
            temperature: self.temperature,
            seed: self.seed,
        }
    }

    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.token_delay_ms)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout_ms.map(Duration::from_millis)
    }
}
