//! Query-time retrieval: embed, over-fetch candidates, filter by source,
//! degrade to unfiltered top-k when the filter starves the result set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embeddings::{l2_normalize, EmbeddingBackend};
use crate::error::{RagError, Result};
use crate::storage::VectorIndex;
use crate::types::{Chunk, ScoredChunk};

/// Parsed source filter. "All" (case-insensitive) and the empty string mean
/// no filtering; anything else is matched as a case-insensitive prefix of
/// the chunk's source name.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFilter {
    All,
    Source(String),
}

impl SourceFilter {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Source(trimmed.to_lowercase())
        }
    }

    fn matches(&self, source: &str) -> bool {
        match self {
            Self::All => true,
            Self::Source(prefix) => source.to_lowercase().starts_with(prefix),
        }
    }
}

pub struct Retriever {
    index: VectorIndex,
    chunks: Vec<Chunk>,
    embedder: Arc<dyn EmbeddingBackend>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        index: VectorIndex,
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingBackend>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RagError::IndexCorrupt(format!(
                "index has {} vectors but {} metadata rows",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            index,
            chunks,
            embedder,
            config,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Top-k chunks for `query`, ordered by descending cosine similarity.
    ///
    /// The candidate pool is over-fetched (`max(floor, multiplier * k)`) so
    /// that source filtering still has material to work with. If the filter
    /// collects fewer than k results it is dropped entirely and the raw
    /// top-k wins; a narrow filter degrades to best effort instead of
    /// silently returning a short list.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: &SourceFilter,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_vec = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RagError::EmbeddingBackend("backend returned no vector for query".into())
            })?;
        // Same normalization as build time.
        l2_normalize(&mut query_vec);

        let candidate_n = self
            .config
            .candidate_floor
            .max(self.config.candidate_multiplier.saturating_mul(k));
        let hits = self.index.search(&query_vec, candidate_n)?;

        // Candidate list in score order, unique by sequence_id.
        let mut seen: HashSet<&str> = HashSet::with_capacity(hits.len());
        let mut candidates: Vec<(usize, f32)> = Vec::with_capacity(hits.len());
        for (row, score) in hits {
            let chunk = &self.chunks[row];
            if seen.insert(chunk.sequence_id.as_str()) {
                candidates.push((row, score));
            }
        }

        let picked: Vec<(usize, f32)> = match filter {
            SourceFilter::All => candidates.iter().take(k).copied().collect(),
            SourceFilter::Source(_) => {
                let filtered: Vec<(usize, f32)> = candidates
                    .iter()
                    .filter(|(row, _)| filter.matches(&self.chunks[*row].source))
                    .take(k)
                    .copied()
                    .collect();
                if filtered.len() < k {
                    tracing::debug!(
                        wanted = k,
                        matched = filtered.len(),
                        "source filter starved the result set, falling back to unfiltered top-k"
                    );
                    candidates.iter().take(k).copied().collect()
                } else {
                    filtered
                }
            }
        };

        Ok(picked
            .into_iter()
            .map(|(row, score)| ScoredChunk {
                chunk: self.chunks[row].clone(),
                score,
            })
            .collect())
    }
}
