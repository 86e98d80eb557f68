use crate::error::RagError;
use crate::models::{IndexEntry, SimilarityMetric};
use std::cmp::Ordering;

/// A retrieved chunk with its similarity to the query. Higher is closer for
/// every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub text: &'a str,
    pub score: f32,
    pub position: usize,
}

/// Exact nearest-neighbour index over an immutable set of entries.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    metric: SimilarityMetric,
}

impl VectorIndex {
    pub fn build(entries: Vec<IndexEntry>, metric: SimilarityMetric) -> Result<Self, RagError> {
        let dimensions = entries.first().map(|entry| entry.vector.len()).unwrap_or(0);

        for entry in &entries {
            if entry.vector.len() != dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: dimensions,
                    found: entry.vector.len(),
                });
            }
        }

        Ok(Self {
            entries,
            dimensions,
            metric,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Texts of the `k` closest entries, best first.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<&str>, RagError> {
        Ok(self
            .query_scored(vector, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    pub fn query_scored(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk<'_>>, RagError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                found: vector.len(),
            });
        }

        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| ScoredChunk {
                text: &entry.text,
                score: similarity(self.metric, &entry.vector, vector),
                position,
            })
            .collect();

        // stable sort: equal scores keep insertion order
        scored.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }
}

fn similarity(metric: SimilarityMetric, left: &[f32], right: &[f32]) -> f32 {
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(left, right),
        SimilarityMetric::L2 => -l2_distance(left, right),
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm_left = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let norm_right = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }
    dot / (norm_left * norm_right)
}

fn l2_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}
