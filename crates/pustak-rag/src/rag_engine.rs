//! Query-serving engine: loads the persisted index once at startup and
//! answers questions through the retriever and answer composer. Backends are
//! explicit dependencies constructed by the caller and passed in, never
//! process-wide mutable state.

use std::sync::Arc;

use crate::answer::{self, AnswerComposer};
use crate::config::RagConfig;
use crate::embeddings::EmbeddingBackend;
use crate::error::{RagError, Result};
use crate::llm::GenerationBackend;
use crate::retrieval::{Retriever, SourceFilter};
use crate::storage::IndexStore;
use crate::types::Chunk;

pub struct RagEngine {
    retriever: Retriever,
    composer: AnswerComposer,
    config: RagConfig,
}

impl RagEngine {
    /// Open the engine against the persisted index. `IndexNotFound`,
    /// `IndexCorrupt`, and a dimension disagreement with the embedding
    /// backend are fatal here: serving must not proceed against an absent or
    /// inconsistent index.
    pub fn open(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let (index, chunks) = IndexStore::new(&config.data_dir).load()?;
        if !index.is_empty() && index.dimension() != embedder.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: embedder.dimension(),
                found: index.dimension(),
            });
        }
        tracing::info!(
            chunks = chunks.len(),
            dimension = index.dimension(),
            "engine opened against persisted index"
        );

        let retriever = Retriever::new(index, chunks, embedder, config.retrieval.clone())?;
        let composer = AnswerComposer::new(generator, config.answer.clone());
        Ok(Self {
            retriever,
            composer,
            config,
        })
    }

    pub fn default_k(&self) -> usize {
        self.config.retrieval.default_k
    }

    pub fn chunk_count(&self) -> usize {
        self.retriever.chunk_count()
    }

    /// The sole query interface the UI layer consumes.
    ///
    /// A `calc:` input skips retrieval and generation entirely. Embedding
    /// failures during serving degrade to an error-string answer with empty
    /// contexts rather than failing the request; everything else propagates.
    pub async fn answer_query(
        &self,
        question: &str,
        k: usize,
        source_filter: &str,
    ) -> Result<(String, Vec<Chunk>)> {
        if let Some(result) = answer::calc_command(question) {
            return Ok((result, Vec::new()));
        }

        let filter = SourceFilter::parse(source_filter);
        let contexts = match self.retriever.retrieve(question, k, &filter).await {
            Ok(contexts) => contexts,
            Err(RagError::EmbeddingBackend(msg)) => {
                tracing::warn!("query embedding failed, degrading to error answer: {}", msg);
                return Ok((format!("Embedding backend unavailable: {}", msg), Vec::new()));
            }
            Err(e) => return Err(e),
        };

        let answer = self.composer.answer(question, &contexts).await;
        let chunks = contexts.into_iter().map(|c| c.chunk).collect();
        Ok((answer, chunks))
    }
}
