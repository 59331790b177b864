// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Core pattern entities for the memory store.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Sequence id assigned to an entry at ingestion.
/// Dense, strictly increasing from 0, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single recorded decision event with its contextual features.
///
/// `action` is an open tag; the encoder's one-hot vocabulary covers
/// buy/sell/hold and degrades lossily for anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub action: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub momentum: f64,
    #[serde(default)]
    pub cash: f64,
    #[serde(default)]
    pub positions: f64,
}

impl PatternRecord {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            price: 0.0,
            volume: 0.0,
            momentum: 0.0,
            cash: 0.0,
            positions: 0.0,
        }
    }
}

/// A stored pattern together with its numeric outcome.
/// Immutable once created; the store is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEntry {
    pub id: EntryId,
    pub pattern: PatternRecord,
    pub outcome: f64,
    pub success: bool,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeEntry {
    pub fn new(id: EntryId, pattern: PatternRecord, outcome: f64) -> Self {
        Self {
            id,
            pattern,
            outcome,
            success: outcome > 0.0,
            recorded_at: Utc::now(),
        }
    }
}
