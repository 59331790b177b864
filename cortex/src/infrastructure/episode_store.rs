// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Append-only episode log with retrieval by action tag.
//!
//! The store is the sequence-id authority: `append` hands out dense ids
//! starting at 0, and the façade reuses them for the vector index and the
//! causal graph so the three structures stay aligned.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::domain::pattern::EntryId;

/// A stored (pattern, outcome) pair retrievable by action tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EntryId,
    pub action: String,
    pub outcome: f64,
    pub success: bool,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct EpisodeStore {
    episodes: Vec<Episode>,
}

impl EpisodeStore {
    pub fn new() -> Self {
        Self { episodes: Vec::new() }
    }

    /// Append an episode and return its assigned sequence id. O(1).
    pub fn append(
        &mut self,
        action: impl Into<String>,
        outcome: f64,
        success: bool,
        payload: serde_json::Value,
    ) -> EntryId {
        let id = EntryId(self.episodes.len() as u64);
        self.episodes.push(Episode {
            id,
            action: action.into(),
            outcome,
            success,
            payload,
            recorded_at: Utc::now(),
        });
        id
    }

    /// Episodes whose action matches, insertion order, at most `limit`.
    ///
    /// `min_relevance` is accepted for interface parity with the external
    /// backend but carries no ranking here; relevance scoring lives in the
    /// vector index.
    pub fn retrieve_by_action(
        &self,
        action: &str,
        limit: usize,
        _min_relevance: f64,
    ) -> Vec<Episode> {
        self.episodes
            .iter()
            .filter(|episode| episode.action == action)
            .take(limit)
            .cloned()
            .collect()
    }

    /// All episodes for an action, unranked and unfiltered.
    pub fn all_by_action(&self, action: &str) -> Vec<Episode> {
        self.episodes
            .iter()
            .filter(|episode| episode.action == action)
            .cloned()
            .collect()
    }

    /// Most recently appended episode for an action, if any.
    pub fn last_by_action(&self, action: &str) -> Option<Episode> {
        self.episodes
            .iter()
            .rev()
            .find(|episode| episode.action == action)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}
