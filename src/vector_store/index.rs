//! Similarity index over unit vectors.
//!
//! Scores are inner products, which equal cosine similarity because every
//! stored vector and every query is normalized before it gets here.

use crate::error::{KildeError, Result};
use std::cmp::Ordering;

/// Row index reported for result slots that have no vector behind them.
pub const MISSING_ROW: i64 = -1;

/// Most sentinel slots a search pads with before `k` is rejected.
pub const MAX_PADDING: usize = 100_000;

/// One slot of a k-nearest-neighbor answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Row in the index, or [`MISSING_ROW`].
    pub row: i64,
    /// Inner-product similarity.
    pub score: f32,
}

impl Neighbor {
    fn missing() -> Self {
        Self {
            row: MISSING_ROW,
            score: f32::NEG_INFINITY,
        }
    }

    /// The row as a position, or `None` for a missing slot.
    pub fn row_index(&self) -> Option<usize> {
        usize::try_from(self.row).ok()
    }
}

/// Append-only index supporting top-k search.
///
/// `FlatIndex` is exact; an approximate index can implement this trait
/// without callers changing.
pub trait VectorIndex: Send + Sync {
    /// Dimension every vector must have.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors in order. Either all are appended or none.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()>;

    /// Return exactly `k` slots ordered by descending score, ties by ascending
    /// row. Slots past the number of stored vectors hold [`MISSING_ROW`].
    /// A `k` needing more than [`MAX_PADDING`] sentinel slots is rejected.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// The stored vector for a row.
    fn vector(&self, row: usize) -> Option<&[f32]>;
}

/// Exact inner-product index over a contiguous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from a row-major buffer.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(KildeError::CorruptState(format!(
                "{} values do not form rows of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(KildeError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(KildeError::Validation(
                "Vector contains NaN or infinite values".to_string(),
            ));
        }
        Ok(())
    }
}

fn by_score_then_row(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.data.len().checked_div(self.dimension).unwrap_or(0)
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            self.check(vector)?;
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check(query)?;

        if k == 0 {
            return Ok(Vec::new());
        }
        let rows = self.len();
        if k.saturating_sub(rows) > MAX_PADDING {
            return Err(KildeError::InvalidInput(format!(
                "k = {} is too large for an index of {} rows",
                k, rows
            )));
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row: row as i64,
                score: vector.iter().zip(query).map(|(a, b)| a * b).sum(),
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k, by_score_then_row);
            scored.truncate(k);
        }
        scored.sort_by(by_score_then_row);

        if scored.len() < k {
            scored.resize(k, Neighbor::missing());
        }

        Ok(scored)
    }

    fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_self_query_is_top_hit() {
        let mut index = FlatIndex::new(3);
        let vectors = vec![
            unit(&[1.0, 0.2, 0.0]),
            unit(&[0.1, 1.0, 0.3]),
            unit(&[0.0, 0.3, 1.0]),
        ];
        index.add(&vectors).unwrap();

        for (row, v) in vectors.iter().enumerate() {
            let hits = index.search(v, 1).unwrap();
            assert_eq!(hits[0].row_index(), Some(row));
            assert!((hits[0].score - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_results_descend_by_score() {
        let mut index = FlatIndex::new(2);
        index
            .add(&[unit(&[0.0, 1.0]), unit(&[1.0, 0.0]), unit(&[1.0, 1.0])])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let rows: Vec<i64> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 2, 0]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_smaller_than_len() {
        let mut index = FlatIndex::new(2);
        let vectors: Vec<Vec<f32>> = (0..50)
            .map(|i| unit(&[1.0, i as f32 / 10.0]))
            .collect();
        index.add(&vectors).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let rows: Vec<i64> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_break_by_row() {
        let mut index = FlatIndex::new(2);
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]])
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].row, 0);
        assert_eq!(hits[1].row, 2);
    }

    #[test]
    fn test_missing_slots_use_sentinel() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0]]).unwrap();

        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].row, 0);
        assert!(hits[1..].iter().all(|h| h.row == MISSING_ROW));
        assert!(hits[1..].iter().all(|h| h.row_index().is_none()));
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = FlatIndex::new(2);
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
        assert!(index.search(&[1.0, 0.0], 2).unwrap().iter().all(|h| h.row == MISSING_ROW));
    }

    #[test]
    fn test_dimension_mismatch_appends_nothing() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0]]).unwrap();

        let err = index.add(&[vec![0.0, 1.0], vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, KildeError::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(index.len(), 1);

        assert!(matches!(
            index.search(&[1.0], 1),
            Err(KildeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_vector_lookup() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(index.vector(1), Some(&[0.0, 1.0][..]));
        assert_eq!(index.vector(2), None);
    }

    #[test]
    fn test_oversized_k_is_rejected() {
        let mut index = FlatIndex::new(2);
        index.add(&[vec![1.0, 0.0]]).unwrap();

        assert!(matches!(
            index.search(&[1.0, 0.0], usize::MAX),
            Err(KildeError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0], MAX_PADDING + 2),
            Err(KildeError::InvalidInput(_))
        ));
        let padded = index.search(&[1.0, 0.0], MAX_PADDING + 1).unwrap();
        assert_eq!(padded.len(), MAX_PADDING + 1);
        assert_eq!(padded[0].row_index(), Some(0));
    }

    #[test]
    fn test_from_raw_validates_shape() {
        assert!(FlatIndex::from_raw(3, vec![0.0; 7]).is_err());
        assert_eq!(FlatIndex::from_raw(3, vec![0.0; 6]).unwrap().len(), 2);
    }
}
