pub mod hashed;
pub mod remote;

pub use hashed::HashedNgramEmbedder;
pub use remote::{EmbeddingProvider, RemoteEmbedder};

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Pluggable text embedding capability.
///
/// Backends return one vector per input, in input order, each of
/// `dimension()` length and already L2-normalized so cosine similarity
/// reduces to an inner product. A backend failure is not retried here;
/// callers decide whether to retry, fall back, or abort a build.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Reject malformed backend output: wrong count or wrong dimension.
pub(crate) fn check_shape(
    backend: &str,
    expected_count: usize,
    expected_dim: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(RagError::EmbeddingBackend(format!(
            "{} returned {} vectors for {} inputs",
            backend,
            vectors.len(),
            expected_count
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dim) {
        return Err(RagError::EmbeddingBackend(format!(
            "{} returned dimension {}, expected {}",
            backend,
            bad.len(),
            expected_dim
        )));
    }
    Ok(())
}

/// Ordered chain of embedding adapters: try each in order, treating any
/// adapter failure as non-fatal until all are exhausted.
///
/// All backends in one chain must agree on dimension; otherwise a fallback
/// at query time would silently disagree with the index built earlier.
pub struct FallbackEmbedder {
    backends: Vec<Box<dyn EmbeddingBackend>>,
}

impl FallbackEmbedder {
    pub fn new(backends: Vec<Box<dyn EmbeddingBackend>>) -> Result<Self> {
        let first_dim = match backends.first() {
            Some(b) => b.dimension(),
            None => {
                return Err(RagError::EmbeddingBackend(
                    "fallback chain needs at least one backend".into(),
                ))
            }
        };
        if let Some(other) = backends.iter().find(|b| b.dimension() != first_dim) {
            return Err(RagError::DimensionMismatch {
                expected: first_dim,
                found: other.dimension(),
            });
        }
        Ok(Self { backends })
    }
}

#[async_trait]
impl EmbeddingBackend for FallbackEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = String::new();
        for backend in &self.backends {
            match backend.embed(texts).await {
                Ok(vectors) => {
                    check_shape(backend.name(), texts.len(), self.dimension(), &vectors)?;
                    return Ok(vectors);
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), "embedding backend failed: {}", e);
                    last_error = e.to_string();
                }
            }
        }
        Err(RagError::EmbeddingBackend(format!(
            "all {} embedding backends failed; last error: {}",
            self.backends.len(),
            last_error
        )))
    }

    fn dimension(&self) -> usize {
        self.backends[0].dimension()
    }

    fn name(&self) -> &str {
        "fallback-chain"
    }
}
