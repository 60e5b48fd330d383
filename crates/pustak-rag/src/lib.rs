//! pustak-rag: a lightweight retrieval-augmented QA engine over a folder of
//! books. Chunk, embed, index, retrieve, and compose grounded answers with
//! an inline calculator protocol.

pub mod answer;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod indexing;
pub mod llm;
pub mod processing;
pub mod rag_engine;
pub mod retrieval;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use indexing::IndexBuilder;
pub use rag_engine::RagEngine;
pub use retrieval::SourceFilter;
pub use types::{BuildReport, Chunk, ScoredChunk};
