// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the pattern memory store.
//! Published to the EventBus for observability and integration; event
//! delivery is never load-bearing for the in-memory write path.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::EntryId;

/// Memory domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// A pattern/outcome pair was ingested
    PatternStored {
        entry_id: EntryId,
        action: String,
        outcome: f64,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A causal edge was recorded between consecutive entries
    CausalEdgeRecorded {
        from: EntryId,
        to: EntryId,
        delta_outcome: f64,
        timestamp: DateTime<Utc>,
    },

    /// An optional backend call failed and the in-memory path was used instead
    BackendDegraded {
        operation: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl MemoryEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MemoryEvent::PatternStored { timestamp, .. } => *timestamp,
            MemoryEvent::CausalEdgeRecorded { timestamp, .. } => *timestamp,
            MemoryEvent::BackendDegraded { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            MemoryEvent::PatternStored { .. } => "pattern_stored",
            MemoryEvent::CausalEdgeRecorded { .. } => "causal_edge_recorded",
            MemoryEvent::BackendDegraded { .. } => "backend_degraded",
        }
    }
}

/// Event bus trait for publishing domain events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: MemoryEvent) -> Result<()>;
}

/// Event bus that drops everything; the default when no integration is wired.
pub struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn publish(&self, _event: MemoryEvent) -> Result<()> {
        Ok(())
    }
}
