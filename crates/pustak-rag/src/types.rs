use serde::{Deserialize, Serialize};

/// A bounded slice of source text with provenance metadata.
///
/// Chunks are created during index build, immutable thereafter, and replaced
/// only by a full rebuild. `sequence_id` is derived deterministically from
/// `(source, page, ordinal)` and is unique within one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Originating document name (file name, not full path).
    pub source: String,
    /// 1-based page of origin; 0 when the document has no pagination.
    pub page: usize,
    pub sequence_id: String,
}

impl Chunk {
    /// Stable external key for a chunk: `{source}_p{page}_c{ordinal}`.
    pub fn sequence_id_for(source: &str, page: usize, ordinal: usize) -> String {
        format!("{}_p{}_c{}", source, page, ordinal)
    }
}

/// A retrieved chunk carrying its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Summary returned by a successful index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}
