//! Deterministic offline embedder: signed character-trigram hashing into a
//! fixed number of buckets, L2-normalized. No model files, no network. Useful
//! for air-gapped indexes and as the last link of a fallback chain, with
//! retrieval quality well below a real sentence encoder.

use async_trait::async_trait;

use super::{l2_normalize, EmbeddingBackend};
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x1000_0000_01b3;

pub struct HashedNgramEmbedder {
    dimension: usize,
}

impl HashedNgramEmbedder {
    pub fn new(dimension: usize) -> Self {
        debug_assert!(dimension > 0);
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let hash = fnv1a(window);
            let bucket = (hash % self.dimension as u64) as usize;
            // Top bit decides the sign so colliding trigrams can cancel
            // instead of always accumulating.
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingBackend for HashedNgramEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed-ngram"
    }
}

/// FNV-1a over the UTF-8 bytes of a char window. Stable across processes,
/// unlike `DefaultHasher`.
fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut buf = [0u8; 4];
    for &c in chars {
        for &b in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}
