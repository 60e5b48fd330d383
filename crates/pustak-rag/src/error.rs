use std::path::PathBuf;
use thiserror::Error;

use crate::answer::calculator::CalcError;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors surfaced by the retrieval-augmented query core.
///
/// Index errors (`IndexNotFound`, `IndexCorrupt`, `DimensionMismatch`) are
/// fatal to startup and build; backend errors are degraded to user-visible
/// text at the answer boundary during serving.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read document {path}: {reason}")]
    Document { path: PathBuf, reason: String },

    #[error("embedding backend failure: {0}")]
    EmbeddingBackend(String),

    #[error("generation backend failure: {0}")]
    GenerationBackend(String),

    #[error("index not found at {0} (run a build first)")]
    IndexNotFound(PathBuf),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("no extractable documents found in {0}")]
    NoDocumentsFound(PathBuf),

    #[error("calculator error: {0}")]
    CalculatorEval(#[from] CalcError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
