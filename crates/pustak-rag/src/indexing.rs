//! Index build orchestration: walk a folder of documents in deterministic
//! order, chunk, embed in batches, and persist the index atomically.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::config::RagConfig;
use crate::embeddings::EmbeddingBackend;
use crate::error::{RagError, Result};
use crate::processing::{DocumentParser, TextChunker};
use crate::storage::{IndexStore, VectorIndex};
use crate::types::{BuildReport, Chunk};

const EMBED_BATCH: usize = 32;

pub struct IndexBuilder {
    chunker: TextChunker,
    parser: DocumentParser,
    embedder: Arc<dyn EmbeddingBackend>,
    store: IndexStore,
}

impl IndexBuilder {
    pub fn new(config: &RagConfig, embedder: Arc<dyn EmbeddingBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunker: TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
            parser: DocumentParser::new(),
            embedder,
            store: IndexStore::new(&config.data_dir),
        })
    }

    /// Build and persist a fresh index from every supported document under
    /// `folder`. Aborts with `NoDocumentsFoundError` before any persistence
    /// write if nothing yields a chunk, leaving a previous index untouched.
    pub async fn build(&self, folder: &Path) -> Result<BuildReport> {
        let files = collect_documents(folder);
        tracing::info!(folder = %folder.display(), files = files.len(), "starting index build");

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut documents = 0usize;
        for path in &files {
            let pages = match self.parser.parse_file(path) {
                Ok(pages) => pages,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable document: {}", e);
                    continue;
                }
            };

            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let before = chunks.len();
            for page in &pages {
                chunks.extend(self.chunker.chunk_page(&source, page.page, &page.text));
            }
            if chunks.len() > before {
                documents += 1;
            }
            tracing::debug!(source = %source, chunks = chunks.len() - before, "document chunked");
        }

        if chunks.is_empty() {
            return Err(RagError::NoDocumentsFound(folder.to_path_buf()));
        }

        tracing::info!(
            chunks = chunks.len(),
            documents,
            backend = self.embedder.name(),
            "embedding chunks"
        );
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            vectors.extend(self.embedder.embed(&texts).await?);
        }

        let index = VectorIndex::build(vectors)?;
        self.store.save(&index, &chunks)?;

        Ok(BuildReport {
            documents,
            chunks: chunks.len(),
            dimension: index.dimension(),
        })
    }
}

/// Supported documents under `folder`, lexicographically ordered so rebuilds
/// of unchanged sources produce identical indexes.
fn collect_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| DocumentParser::supported(path))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use std::fs;

    fn test_config(data_dir: &Path) -> RagConfig {
        let mut config = RagConfig::default();
        config.data_dir = data_dir.to_path_buf();
        config.chunking.chunk_size = 50;
        config.chunking.chunk_overlap = 10;
        config
    }

    #[tokio::test]
    async fn build_from_text_folder_persists_loadable_index() {
        let dir = tempfile::tempdir().unwrap();
        let books = dir.path().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join("a.txt"), "alpha ".repeat(30)).unwrap();
        fs::write(books.join("b.md"), "bravo ".repeat(30)).unwrap();
        fs::write(books.join("ignored.docx"), "not supported").unwrap();

        let config = test_config(&dir.path().join("data"));
        let builder =
            IndexBuilder::new(&config, Arc::new(HashedNgramEmbedder::new(32))).unwrap();
        let report = builder.build(&books).await.unwrap();

        assert_eq!(report.documents, 2);
        assert!(report.chunks > 2);
        assert_eq!(report.dimension, 32);

        let (index, chunks) = IndexStore::new(&config.data_dir).load().unwrap();
        assert_eq!(index.len(), chunks.len());
        assert_eq!(index.len(), report.chunks);
    }

    #[tokio::test]
    async fn empty_folder_aborts_without_touching_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let books = dir.path().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join("a.txt"), "text for the first build").unwrap();

        let config = test_config(&dir.path().join("data"));
        let embedder = Arc::new(HashedNgramEmbedder::new(32));
        let builder = IndexBuilder::new(&config, embedder.clone()).unwrap();
        builder.build(&books).await.unwrap();

        let empty = dir.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let err = builder.build(&empty).await.unwrap_err();
        assert!(matches!(err, RagError::NoDocumentsFound(_)));

        // Prior index still loads.
        assert!(IndexStore::new(&config.data_dir).load().is_ok());
    }

    #[tokio::test]
    async fn rebuild_is_deterministic_for_same_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let books = dir.path().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join("a.txt"), "the quick brown fox ".repeat(20)).unwrap();

        let config = test_config(&dir.path().join("data"));
        let builder =
            IndexBuilder::new(&config, Arc::new(HashedNgramEmbedder::new(32))).unwrap();

        builder.build(&books).await.unwrap();
        let (_, first) = IndexStore::new(&config.data_dir).load().unwrap();
        builder.build(&books).await.unwrap();
        let (_, second) = IndexStore::new(&config.data_dir).load().unwrap();

        let first_ids: Vec<_> = first.iter().map(|c| c.sequence_id.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|c| c.sequence_id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
