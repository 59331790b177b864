// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Causal adjacency between consecutive entries.
//!
//! The graph is a chain with weighted edges: ingestion only ever links the
//! most recent prior entry to the newly stored one, so `effects_of` returns
//! at most one edge per id unless a caller records extras by hand.

use serde::{Deserialize, Serialize};

use crate::domain::pattern::EntryId;

/// Directed weighted edge between two temporally adjacent entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEdge {
    pub from: EntryId,
    pub to: EntryId,
    /// Outcome of `to` minus outcome of `from`.
    pub delta_outcome: f64,
    pub confidence: f64,
    pub weight: f64,
}

/// Append-only edge list. Ids are accepted referentially; callers are
/// responsible for their validity.
#[derive(Debug, Default)]
pub struct CausalGraph {
    edges: Vec<CausalEdge>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Record a directed edge. Duplicates are retained.
    pub fn add_edge(
        &mut self,
        from: EntryId,
        to: EntryId,
        delta_outcome: f64,
        confidence: f64,
        weight: f64,
    ) {
        self.edges.push(CausalEdge {
            from,
            to,
            delta_outcome,
            confidence,
            weight,
        });
    }

    /// All edges originating at `id`, in insertion order.
    pub fn effects_of(&self, id: EntryId) -> Vec<CausalEdge> {
        self.edges
            .iter()
            .filter(|edge| edge.from == id)
            .cloned()
            .collect()
    }
}
