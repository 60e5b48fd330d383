//! Persistence for the index artifact: two co-located files under an
//! `index/` directory, a binary vector store and a JSON metadata table.
//! They are only valid together; a build writes both into a staging
//! directory and swaps it into place, so readers of the previous index are
//! never exposed to a partially written one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::storage::VectorIndex;
use crate::types::Chunk;

const VECTORS_FILE: &str = "vectors.bin";
const META_FILE: &str = "meta.json";

const MAGIC: [u8; 4] = *b"PRAG";
const FORMAT_VERSION: u32 = 1;
/// magic + version + dimension (u32 LE) + row count (u64 LE).
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Serialize, Deserialize)]
struct MetaFile {
    built_at: i64,
    dimension: usize,
    chunks: Vec<Chunk>,
}

pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn live_dir(&self) -> PathBuf {
        self.dir.join("index")
    }

    pub fn exists(&self) -> bool {
        let live = self.live_dir();
        live.join(VECTORS_FILE).exists() && live.join(META_FILE).exists()
    }

    /// Persist vectors + metadata atomically. The previous index stays
    /// servable until the staged replacement is swapped in.
    pub fn save(&self, index: &VectorIndex, chunks: &[Chunk]) -> Result<()> {
        if index.len() != chunks.len() {
            return Err(RagError::IndexCorrupt(format!(
                "refusing to persist: {} vectors but {} metadata rows",
                index.len(),
                chunks.len()
            )));
        }

        fs::create_dir_all(&self.dir)?;
        let staging = self.dir.join("index.staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        fs::write(
            staging.join(VECTORS_FILE),
            encode_vectors(index.dimension(), index.len(), index.data()),
        )?;

        let meta = MetaFile {
            built_at: chrono::Utc::now().timestamp(),
            dimension: index.dimension(),
            chunks: chunks.to_vec(),
        };
        fs::write(staging.join(META_FILE), serde_json::to_vec(&meta)?)?;

        // Swap: retire the live directory, promote staging, drop the old one.
        let live = self.live_dir();
        let old = self.dir.join("index.old");
        if old.exists() {
            fs::remove_dir_all(&old)?;
        }
        if live.exists() {
            fs::rename(&live, &old)?;
        }
        fs::rename(&staging, &live)?;
        if old.exists() {
            // Retired copy is expendable; a failure here leaves garbage, not
            // a broken index.
            let _ = fs::remove_dir_all(&old);
        }

        tracing::info!(
            rows = index.len(),
            dimension = index.dimension(),
            path = %live.display(),
            "index persisted"
        );
        Ok(())
    }

    /// Load the persisted pair. Absent artifact is `IndexNotFound`; a half
    /// artifact or any internal disagreement is `IndexCorrupt`. Never
    /// silently returns an empty index.
    pub fn load(&self) -> Result<(VectorIndex, Vec<Chunk>)> {
        let live = self.live_dir();
        let vectors_path = live.join(VECTORS_FILE);
        let meta_path = live.join(META_FILE);

        match (vectors_path.exists(), meta_path.exists()) {
            (false, false) => return Err(RagError::IndexNotFound(live)),
            (true, false) | (false, true) => {
                return Err(RagError::IndexCorrupt(format!(
                    "vector store and metadata table must be loaded together; \
                     only one of {} / {} is present",
                    VECTORS_FILE, META_FILE
                )))
            }
            (true, true) => {}
        }

        let (dimension, rows, data) = decode_vectors(&fs::read(&vectors_path)?)?;

        let meta: MetaFile = serde_json::from_slice(&fs::read(&meta_path)?)
            .map_err(|e| RagError::IndexCorrupt(format!("metadata table unreadable: {}", e)))?;

        if meta.dimension != dimension {
            return Err(RagError::IndexCorrupt(format!(
                "metadata says dimension {}, vector store says {}",
                meta.dimension, dimension
            )));
        }
        if meta.chunks.len() != rows {
            return Err(RagError::IndexCorrupt(format!(
                "metadata has {} rows, vector store has {}",
                meta.chunks.len(),
                rows
            )));
        }

        let index = VectorIndex::from_raw(dimension, rows, data)?;
        Ok((index, meta.chunks))
    }
}

fn encode_vectors(dimension: usize, rows: usize, data: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(dimension as u32).to_le_bytes());
    out.extend_from_slice(&(rows as u64).to_le_bytes());
    for value in data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn decode_vectors(bytes: &[u8]) -> Result<(usize, usize, Vec<f32>)> {
    if bytes.len() < HEADER_LEN {
        return Err(RagError::IndexCorrupt("vector store truncated".into()));
    }
    if bytes[..4] != MAGIC {
        return Err(RagError::IndexCorrupt(
            "vector store has wrong magic bytes".into(),
        ));
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    if version != FORMAT_VERSION {
        return Err(RagError::IndexCorrupt(format!(
            "unsupported vector store version {}",
            version
        )));
    }
    let dimension = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    let rows = u64::from_le_bytes(bytes[12..20].try_into().unwrap()) as usize;

    let payload = &bytes[HEADER_LEN..];
    let expected = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RagError::IndexCorrupt("vector store header overflows".into()))?;
    if payload.len() != expected {
        return Err(RagError::IndexCorrupt(format!(
            "vector store payload is {} bytes, header promises {}",
            payload.len(),
            expected
        )));
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
        .collect();
    Ok((dimension, rows, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                text: format!("chunk {}", i),
                source: "book.pdf".to_string(),
                page: 1,
                sequence_id: Chunk::sequence_id_for("book.pdf", 1, i + 1),
            })
            .collect()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = VectorIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        store.save(&index, &sample_chunks(2)).unwrap();

        let (loaded, chunks) = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].sequence_id, "book.pdf_p1_c1");

        let hits = loaded.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, 0);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        assert!(matches!(store.load(), Err(RagError::IndexNotFound(_))));
    }

    #[test]
    fn half_artifact_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = VectorIndex::build(vec![vec![1.0]]).unwrap();
        store.save(&index, &sample_chunks(1)).unwrap();

        fs::remove_file(dir.path().join("index").join(META_FILE)).unwrap();
        assert!(matches!(store.load(), Err(RagError::IndexCorrupt(_))));
    }

    #[test]
    fn row_count_disagreement_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = VectorIndex::build(vec![vec![1.0], vec![2.0]]).unwrap();
        store.save(&index, &sample_chunks(2)).unwrap();

        // Rewrite the metadata with one row missing.
        let meta_path = dir.path().join("index").join(META_FILE);
        let meta = MetaFile {
            built_at: 0,
            dimension: 1,
            chunks: sample_chunks(1),
        };
        fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();
        assert!(matches!(store.load(), Err(RagError::IndexCorrupt(_))));
    }

    #[test]
    fn garbage_vector_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = VectorIndex::build(vec![vec![1.0]]).unwrap();
        store.save(&index, &sample_chunks(1)).unwrap();

        fs::write(dir.path().join("index").join(VECTORS_FILE), b"nonsense").unwrap();
        assert!(matches!(store.load(), Err(RagError::IndexCorrupt(_))));
    }

    #[test]
    fn rebuild_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());

        let first = VectorIndex::build(vec![vec![1.0]]).unwrap();
        store.save(&first, &sample_chunks(1)).unwrap();

        let second = VectorIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .unwrap();
        store.save(&second, &sample_chunks(3)).unwrap();

        let (loaded, chunks) = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn mismatched_rows_refused_at_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = VectorIndex::build(vec![vec![1.0]]).unwrap();
        let err = store.save(&index, &sample_chunks(2)).unwrap_err();
        assert!(matches!(err, RagError::IndexCorrupt(_)));
    }
}
