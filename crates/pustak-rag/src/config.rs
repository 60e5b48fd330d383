use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::llm::GenerationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Directory holding the persisted index artifact.
    pub data_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_k: usize,
    /// Minimum candidate pool fetched before source filtering.
    pub candidate_floor: usize,
    /// Candidate pool also scales with k: max(floor, multiplier * k).
    pub candidate_multiplier: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Literal sentence the model is instructed to emit for ungrounded questions.
    pub fallback_sentence: String,
    /// Per-context character budget in the assembled prompt.
    pub max_context_chars: usize,
    pub generation: GenerationConfig,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::Config(
                "chunking.chunk_overlap must be < chunk_size".into(),
            ));
        }
        if self.retrieval.default_k == 0 {
            return Err(RagError::Config("retrieval.default_k must be > 0".into()));
        }
        if self.retrieval.candidate_floor == 0 {
            return Err(RagError::Config(
                "retrieval.candidate_floor must be > 0".into(),
            ));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(RagError::Config(
                "retrieval.candidate_multiplier must be > 0".into(),
            ));
        }
        if self.answer.fallback_sentence.trim().is_empty() {
            return Err(RagError::Config(
                "answer.fallback_sentence must not be empty".into(),
            ));
        }
        if self.answer.max_context_chars == 0 {
            return Err(RagError::Config(
                "answer.max_context_chars must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pustak-rag");

        Self {
            data_dir,
            chunking: ChunkingConfig {
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            retrieval: RetrievalConfig {
                default_k: 4,
                candidate_floor: 50,
                candidate_multiplier: 10,
            },
            answer: AnswerConfig {
                fallback_sentence: "I don't know based on the provided material".to_string(),
                max_context_chars: 1500,
                generation: GenerationConfig::default(),
            },
        }
    }
}
