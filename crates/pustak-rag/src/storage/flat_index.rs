//! Flat exact inner-product index. Inputs are unit vectors, so the inner
//! product is the cosine similarity. Brute force is the correctness baseline
//! at this scale; approximate structures would have to reproduce this exact
//! ranking to be admissible.

use std::cmp::Ordering;

use crate::error::{RagError, Result};

#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    rows: usize,
    /// Row-major matrix: row i occupies data[i*dimension .. (i+1)*dimension].
    data: Vec<f32>,
}

impl VectorIndex {
    /// Construct a search structure over exactly these vectors.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for v in &vectors {
            if v.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    found: v.len(),
                });
            }
            data.extend_from_slice(v);
        }
        Ok(Self {
            dimension,
            rows: vectors.len(),
            data,
        })
    }

    /// Reassemble an index from persisted parts.
    pub(crate) fn from_raw(dimension: usize, rows: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * dimension {
            return Err(RagError::IndexCorrupt(format!(
                "vector store holds {} floats, expected {} ({} rows x {} dims)",
                data.len(),
                rows * dimension,
                rows,
                dimension
            )));
        }
        Ok(Self {
            dimension,
            rows,
            data,
        })
    }

    /// Top-n rows by inner product, descending. Returns fewer than `n`
    /// entries only when the index has fewer than `n` rows.
    pub fn search(&self, query: &[f32], n: usize) -> Result<Vec<(usize, f32)>> {
        if self.rows == 0 || n == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vec)| {
                let score: f32 = vec.iter().zip(query).map(|(a, b)| a * b).sum();
                (row, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(n);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub(crate) fn data(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inconsistent_dimensions_rejected() {
        let err = VectorIndex::build(vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[test]
    fn search_orders_by_inner_product_descending() {
        let index = VectorIndex::build(vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.707, 0.707],
        ])
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 1);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn search_returns_at_most_available_rows() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0]]).unwrap();
        let hits = index.search(&[0.6, 0.8], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn query_dimension_checked() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0]]).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[test]
    fn empty_index_searches_to_empty() {
        let index = VectorIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[], 5).unwrap().is_empty());
    }
}
