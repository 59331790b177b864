// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Insertion-ordered vector index with cosine-similarity ranking.
//!
//! Reference similarity path for the whole crate. An accelerated backend may
//! supply batch scores instead (see [`VectorIndex::rank_with_scores`]) but
//! must agree with [`cosine_similarity`] within 1e-6.

use crate::domain::pattern::OutcomeEntry;

/// Calculate cosine similarity between two vectors.
/// Zero-magnitude vectors and mismatched lengths yield 0.0, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)) as f64
}

/// Stores one feature vector per stored entry, in insertion order.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Vec<f32>, OutcomeEntry)>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a vector with its entry metadata. O(1), infallible.
    pub fn insert(&mut self, vector: Vec<f32>, entry: OutcomeEntry) {
        self.entries.push((vector, entry));
    }

    /// Rank stored entries against a query vector.
    ///
    /// Returns at most `k` results sorted by similarity descending; ties keep
    /// insertion order (stable sort). With `success_only` set, entries whose
    /// outcome is non-positive are excluded before ranking. An empty index
    /// returns an empty result.
    pub fn query(
        &self,
        query_vector: &[f32],
        k: usize,
        success_only: bool,
    ) -> Vec<(OutcomeEntry, f64)> {
        let scores: Vec<f64> = self
            .entries
            .iter()
            .map(|(vector, _)| cosine_similarity(query_vector, vector))
            .collect();

        self.rank_with_scores(&scores, k, success_only)
    }

    /// Rank with externally computed similarity scores, one per stored entry
    /// in insertion order. Used to substitute an accelerated similarity
    /// backend for the local cosine path; the ranking contract is identical.
    pub fn rank_with_scores(
        &self,
        scores: &[f64],
        k: usize,
        success_only: bool,
    ) -> Vec<(OutcomeEntry, f64)> {
        if scores.len() != self.entries.len() {
            return Vec::new();
        }

        let mut results: Vec<(OutcomeEntry, f64)> = self
            .entries
            .iter()
            .zip(scores.iter())
            .filter(|((_, entry), _)| !success_only || entry.outcome > 0.0)
            .map(|((_, entry), score)| (entry.clone(), *score))
            .collect();

        // Stable sort keeps insertion order among equal scores
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        results
    }

    /// Stored vectors in insertion order, for batch similarity offload.
    pub fn vectors(&self) -> Vec<Vec<f32>> {
        self.entries.iter().map(|(vector, _)| vector.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
