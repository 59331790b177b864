// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! # PatternMemory — Pattern Storage & Retrieval façade
//!
//! Composes the feature encoder, vector index, episode store and causal
//! graph behind one interface: ingest a (pattern, outcome) pair, query for
//! similar successful patterns, and walk cause→effect links between
//! consecutive decisions.
//!
//! ## Degraded-mode guarantee
//!
//! The in-memory structures are authoritative. Every call to the optional
//! persistent backend runs under a bounded timeout after the write lock is
//! released; a timeout or error is logged, published as a `BackendDegraded`
//! event, and otherwise swallowed. No public operation on this façade ever
//! fails outward.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::causal::{CausalEdge, CausalGraph};
use crate::domain::encoder::encode;
use crate::domain::events::{EventBus, MemoryEvent, NullEventBus};
use crate::domain::pattern::{EntryId, OutcomeEntry, PatternRecord};
use crate::domain::skill::{Skill, SkillId};
use crate::infrastructure::backend::{CortexBackend, EpisodeUpload, NullBackend};
use crate::infrastructure::episode_store::{Episode, EpisodeStore};
use crate::infrastructure::vector_index::VectorIndex;

/// Tunables for the façade. The causal edge constants are configuration,
/// not a computed score.
#[derive(Debug, Clone)]
pub struct PatternMemoryConfig {
    /// Default result count for similarity queries
    pub similar_limit: usize,

    /// Confidence recorded on every causal edge
    pub edge_confidence: f64,

    /// Weight recorded on every causal edge
    pub edge_weight: f64,

    /// Episodes returned by a self-critique
    pub critique_limit: usize,

    /// Upper bound on any single backend call
    pub backend_timeout: Duration,
}

impl Default for PatternMemoryConfig {
    fn default() -> Self {
        Self {
            similar_limit: 5,
            edge_confidence: 0.8,
            edge_weight: 1.0,
            critique_limit: 10,
            backend_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a cause→effect query for an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalReasoning {
    pub action: String,
    pub causal_paths: Vec<CausalEdge>,
    pub insight: String,
}

/// Result of a retrospective trajectory analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCritique {
    pub episodes: Vec<Episode>,
    pub summary: String,
}

/// The three ingestion targets, mutated together under one write lock so a
/// reader never observes a partially-ingested entry.
struct MemoryState {
    index: VectorIndex,
    episodes: EpisodeStore,
    causal: CausalGraph,
    last_outcome: Option<(EntryId, f64)>,
}

/// In-process pattern memory store.
///
/// Single logical owner per instance; the internal lock makes shared use
/// safe, but callers remain responsible for cross-operation ordering.
pub struct PatternMemory {
    state: RwLock<MemoryState>,
    backend: Arc<dyn CortexBackend>,
    event_bus: Arc<dyn EventBus>,
    session: String,
    config: PatternMemoryConfig,
}

impl PatternMemory {
    /// In-memory-only store: null backend, no event integration.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(NullBackend))
    }

    pub fn with_backend(backend: Arc<dyn CortexBackend>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                index: VectorIndex::new(),
                episodes: EpisodeStore::new(),
                causal: CausalGraph::new(),
                last_outcome: None,
            }),
            backend,
            event_bus: Arc::new(NullEventBus),
            session: Uuid::new_v4().to_string(),
            config: PatternMemoryConfig::default(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_config(mut self, config: PatternMemoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Session tag attached to episodes forwarded to the backend.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Store a pattern with its outcome and return the new entry.
    ///
    /// Assigns the next sequence id, inserts into the vector index and the
    /// episode store, and links a causal edge from the previous entry when
    /// one exists. Backend forwarding is best-effort and happens after the
    /// in-memory write is complete.
    pub async fn store_pattern(&self, pattern: PatternRecord, outcome: f64) -> OutcomeEntry {
        let features = encode(&pattern);
        let success = outcome > 0.0;
        let payload = serde_json::to_value(&pattern).unwrap_or(serde_json::Value::Null);

        let (entry, edge) = {
            let mut state = self.state.write().await;

            let id = state
                .episodes
                .append(pattern.action.clone(), outcome, success, payload.clone());
            let entry = OutcomeEntry::new(id, pattern, outcome);
            state.index.insert(features, entry.clone());

            let previous = state.last_outcome;
            let edge = previous.map(|(prev_id, prev_outcome)| {
                state.causal.add_edge(
                    prev_id,
                    id,
                    outcome - prev_outcome,
                    self.config.edge_confidence,
                    self.config.edge_weight,
                );
                CausalEdge {
                    from: prev_id,
                    to: id,
                    delta_outcome: outcome - prev_outcome,
                    confidence: self.config.edge_confidence,
                    weight: self.config.edge_weight,
                }
            });

            state.last_outcome = Some((id, outcome));
            (entry, edge)
        };

        debug!(entry_id = entry.id.0, outcome, success, "Stored pattern");

        self.publish(MemoryEvent::PatternStored {
            entry_id: entry.id,
            action: entry.pattern.action.clone(),
            outcome,
            success,
            timestamp: Utc::now(),
        })
        .await;

        if let Some(ref edge) = edge {
            self.publish(MemoryEvent::CausalEdgeRecorded {
                from: edge.from,
                to: edge.to,
                delta_outcome: edge.delta_outcome,
                timestamp: Utc::now(),
            })
            .await;
        }

        let upload = EpisodeUpload {
            session: self.session.clone(),
            action: entry.pattern.action.clone(),
            score: outcome,
            success,
            note: format!("pattern entry {}", entry.id),
            state: payload,
            meta: json!({ "entry_id": entry.id.0 }),
            max_tokens_in: 0,
            max_tokens_out: 0,
        };
        self.guarded("store_episode", self.backend.store_episode(upload))
            .await;

        if let Some(edge) = edge {
            self.guarded("add_causal_edge", self.backend.add_causal_edge(&edge))
                .await;
        }

        entry
    }

    /// Successful stored patterns most similar to `pattern`, best first.
    pub async fn find_similar(&self, pattern: &PatternRecord) -> Vec<(OutcomeEntry, f64)> {
        self.find_similar_with_limit(pattern, self.config.similar_limit)
            .await
    }

    /// As [`find_similar`](Self::find_similar) with an explicit result count.
    ///
    /// Offloads scoring to the backend's batch similarity when available;
    /// any failure or score-count mismatch falls back to the local cosine
    /// path, which ranks identically.
    pub async fn find_similar_with_limit(
        &self,
        pattern: &PatternRecord,
        k: usize,
    ) -> Vec<(OutcomeEntry, f64)> {
        let features = encode(pattern);

        let vectors = {
            let state = self.state.read().await;
            if state.index.is_empty() {
                return Vec::new();
            }
            state.index.vectors()
        };

        let scores = self
            .guarded(
                "batch_similarity",
                self.backend.batch_similarity(&features, &vectors),
            )
            .await;

        let state = self.state.read().await;
        match scores {
            Some(scores) if scores.len() == state.index.len() => {
                state.index.rank_with_scores(&scores, k, true)
            }
            _ => state.index.query(&features, k, true),
        }
    }

    /// Effects recorded after the most recent entry with a matching action.
    ///
    /// Unknown actions and empty stores yield empty paths with an
    /// explanatory insight, never an error. Backend-known edges are merged
    /// after the authoritative in-memory ones.
    pub async fn causal_reasoning(&self, action: &str) -> CausalReasoning {
        let (entry_id, mut causal_paths) = {
            let state = self.state.read().await;
            match state.episodes.last_by_action(action) {
                Some(episode) => (episode.id, state.causal.effects_of(episode.id)),
                None => {
                    return CausalReasoning {
                        action: action.to_string(),
                        causal_paths: Vec::new(),
                        insight: format!("No patterns found for action '{}'", action),
                    };
                }
            }
        };

        if let Some(remote) = self
            .guarded(
                "query_causal_effects",
                self.backend.query_causal_effects(entry_id),
            )
            .await
        {
            causal_paths.extend(remote);
        }

        let insight = if causal_paths.is_empty() {
            format!(
                "Entry {} for action '{}' has no recorded downstream effects yet",
                entry_id, action
            )
        } else {
            let mean_delta: f64 = causal_paths
                .iter()
                .map(|edge| edge.delta_outcome)
                .sum::<f64>()
                / causal_paths.len() as f64;
            format!(
                "Action '{}' was followed by {} effect(s) with mean outcome delta {:.2}",
                action,
                causal_paths.len(),
                mean_delta
            )
        };

        CausalReasoning {
            action: action.to_string(),
            causal_paths,
            insight,
        }
    }

    /// Retrospective look at stored episodes matching a trajectory's task
    /// type, derived from its first action (or "unknown" when empty).
    pub async fn self_critique(&self, trajectory: &[PatternRecord]) -> SelfCritique {
        let task_type = trajectory
            .first()
            .map(|pattern| pattern.action.as_str())
            .unwrap_or("unknown");

        let episodes = {
            let state = self.state.read().await;
            state
                .episodes
                .retrieve_by_action(task_type, self.config.critique_limit, 0.0)
        };

        let summary = if episodes.is_empty() {
            format!("No stored episodes for task type '{}'", task_type)
        } else {
            let successes = episodes.iter().filter(|episode| episode.success).count();
            format!(
                "{} of {} episode(s) for task type '{}' succeeded",
                successes,
                episodes.len(),
                task_type
            )
        };

        SelfCritique { episodes, summary }
    }

    /// Register a reusable skill with the backend. Best-effort; `None` when
    /// the backend is unavailable.
    pub async fn crystallize_skill(
        &self,
        name: &str,
        description: &str,
        input_schema: serde_json::Value,
        output_schema: serde_json::Value,
        version: u32,
    ) -> Option<SkillId> {
        self.guarded(
            "create_skill",
            self.backend
                .create_skill(name, description, input_schema, output_schema, version),
        )
        .await
    }

    /// Search backend skills. Empty when the backend is unavailable.
    pub async fn search_skills(&self, query: &str, limit: usize, min_score: f64) -> Vec<Skill> {
        self.guarded(
            "search_skills",
            self.backend.search_skills(query, limit, min_score),
        )
        .await
        .unwrap_or_default()
    }

    /// Release backend resources. Safe without a backend attached.
    pub async fn close(&self) {
        self.guarded("close", self.backend.close()).await;
    }

    /// Run a backend call under the configured timeout; failures degrade to
    /// `None` and are reported, never propagated.
    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.config.backend_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                warn!(operation, %error, "Backend call failed, using in-memory result");
                self.publish(MemoryEvent::BackendDegraded {
                    operation: operation.to_string(),
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
                None
            }
            Err(_) => {
                warn!(operation, "Backend call timed out, using in-memory result");
                self.publish(MemoryEvent::BackendDegraded {
                    operation: operation.to_string(),
                    reason: "timeout".to_string(),
                    timestamp: Utc::now(),
                })
                .await;
                None
            }
        }
    }

    async fn publish(&self, event: MemoryEvent) {
        if let Err(error) = self.event_bus.publish(event).await {
            warn!(%error, "Failed to publish memory event");
        }
    }
}

impl Default for PatternMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn pattern(action: &str, price: f64, momentum: f64) -> PatternRecord {
        PatternRecord {
            action: action.to_string(),
            price,
            volume: 1_000.0,
            momentum,
            cash: 50_000.0,
            positions: 1.0,
        }
    }

    // Event bus that records everything it sees
    struct CollectingEventBus {
        events: Mutex<Vec<MemoryEvent>>,
    }

    impl CollectingEventBus {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn event_types(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|event| event.event_type())
                .collect()
        }
    }

    #[async_trait]
    impl EventBus for CollectingEventBus {
        async fn publish(&self, event: MemoryEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    // Backend where every call fails
    struct FailingBackend;

    #[async_trait]
    impl CortexBackend for FailingBackend {
        async fn create_skill(
            &self,
            _name: &str,
            _description: &str,
            _input_schema: serde_json::Value,
            _output_schema: serde_json::Value,
            _version: u32,
        ) -> Result<SkillId> {
            anyhow::bail!("backend down")
        }

        async fn store_episode(&self, _upload: EpisodeUpload) -> Result<()> {
            anyhow::bail!("backend down")
        }

        async fn add_causal_edge(&self, _edge: &CausalEdge) -> Result<()> {
            anyhow::bail!("backend down")
        }

        async fn query_causal_effects(&self, _id: EntryId) -> Result<Vec<CausalEdge>> {
            anyhow::bail!("backend down")
        }

        async fn search_skills(
            &self,
            _query: &str,
            _limit: usize,
            _min_score: f64,
        ) -> Result<Vec<Skill>> {
            anyhow::bail!("backend down")
        }

        async fn batch_similarity(
            &self,
            _query: &[f32],
            _vectors: &[Vec<f32>],
        ) -> Result<Vec<f64>> {
            anyhow::bail!("backend down")
        }

        async fn close(&self) -> Result<()> {
            anyhow::bail!("backend down")
        }
    }

    // Backend where every call hangs until the guard's timeout fires
    struct HangingBackend;

    impl HangingBackend {
        async fn stall() {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    #[async_trait]
    impl CortexBackend for HangingBackend {
        async fn create_skill(
            &self,
            _name: &str,
            _description: &str,
            _input_schema: serde_json::Value,
            _output_schema: serde_json::Value,
            _version: u32,
        ) -> Result<SkillId> {
            Self::stall().await;
            Ok(SkillId::new())
        }

        async fn store_episode(&self, _upload: EpisodeUpload) -> Result<()> {
            Self::stall().await;
            Ok(())
        }

        async fn add_causal_edge(&self, _edge: &CausalEdge) -> Result<()> {
            Self::stall().await;
            Ok(())
        }

        async fn query_causal_effects(&self, _id: EntryId) -> Result<Vec<CausalEdge>> {
            Self::stall().await;
            Ok(Vec::new())
        }

        async fn search_skills(
            &self,
            _query: &str,
            _limit: usize,
            _min_score: f64,
        ) -> Result<Vec<Skill>> {
            Self::stall().await;
            Ok(Vec::new())
        }

        async fn batch_similarity(
            &self,
            _query: &[f32],
            _vectors: &[Vec<f32>],
        ) -> Result<Vec<f64>> {
            Self::stall().await;
            Ok(Vec::new())
        }

        async fn close(&self) -> Result<()> {
            Self::stall().await;
            Ok(())
        }
    }

    async fn seeded_store() -> PatternMemory {
        let memory = PatternMemory::new();
        memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        memory.store_pattern(pattern("sell", 110.0, -0.2), -5.0).await;
        memory.store_pattern(pattern("buy", 105.0, 0.6), 20.0).await;
        memory
    }

    #[tokio::test]
    async fn test_sequence_ids_are_dense() {
        let memory = PatternMemory::new();
        let a = memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        let b = memory.store_pattern(pattern("sell", 110.0, -0.2), -5.0).await;
        let c = memory.store_pattern(pattern("buy", 105.0, 0.6), 20.0).await;

        assert_eq!(a.id, EntryId(0));
        assert_eq!(b.id, EntryId(1));
        assert_eq!(c.id, EntryId(2));
        assert!(a.success);
        assert!(!b.success);
        assert!(c.success);
    }

    #[tokio::test]
    async fn test_causal_chain_deltas() {
        let memory = seeded_store().await;

        let from_a = memory.causal_reasoning("buy").await;
        // Most recent buy is entry 2, the chain tail: no downstream effects
        assert!(from_a.causal_paths.is_empty());

        let from_b = memory.causal_reasoning("sell").await;
        assert_eq!(from_b.causal_paths.len(), 1);
        assert_eq!(from_b.causal_paths[0].from, EntryId(1));
        assert_eq!(from_b.causal_paths[0].to, EntryId(2));
        assert_eq!(from_b.causal_paths[0].delta_outcome, 25.0);
        assert_eq!(from_b.causal_paths[0].confidence, 0.8);
        assert_eq!(from_b.causal_paths[0].weight, 1.0);

        // The 0 -> 1 edge carries outcome delta -5 - 10 = -15
        let state = memory.state.read().await;
        let first_effects = state.causal.effects_of(EntryId(0));
        assert_eq!(first_effects.len(), 1);
        assert_eq!(first_effects[0].delta_outcome, -15.0);
    }

    #[tokio::test]
    async fn test_find_similar_excludes_failures() {
        let memory = seeded_store().await;

        let results = memory.find_similar(&pattern("buy", 102.0, 0.5)).await;
        assert_eq!(results.len(), 2);
        for (entry, _) in &results {
            assert!(entry.outcome > 0.0);
            assert_eq!(entry.pattern.action, "buy");
        }
    }

    #[tokio::test]
    async fn test_find_similar_is_idempotent() {
        let memory = seeded_store().await;
        let query = pattern("buy", 102.0, 0.5);

        let first = memory.find_similar(&query).await;
        let second = memory.find_similar(&query).await;

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.0.id, b.0.id);
            assert_eq!(a.1, b.1);
        }
    }

    #[tokio::test]
    async fn test_empty_store_queries() {
        let memory = PatternMemory::new();

        assert!(memory.find_similar(&pattern("buy", 100.0, 0.5)).await.is_empty());

        let reasoning = memory.causal_reasoning("buy").await;
        assert!(reasoning.causal_paths.is_empty());
        assert!(reasoning.insight.starts_with("No patterns found"));

        let critique = memory.self_critique(&[]).await;
        assert!(critique.episodes.is_empty());
        assert!(critique.summary.contains("unknown"));
    }

    #[tokio::test]
    async fn test_self_critique_uses_first_action() {
        let memory = seeded_store().await;

        let trajectory = vec![pattern("buy", 100.0, 0.5), pattern("sell", 110.0, 0.0)];
        let critique = memory.self_critique(&trajectory).await;

        assert_eq!(critique.episodes.len(), 2);
        assert!(critique.episodes.iter().all(|e| e.action == "buy"));
        assert!(critique.summary.contains("2 of 2"));
    }

    #[tokio::test]
    async fn test_failing_backend_never_surfaces() {
        let memory = PatternMemory::with_backend(Arc::new(FailingBackend));

        let entry = memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        assert_eq!(entry.id, EntryId(0));
        memory.store_pattern(pattern("buy", 101.0, 0.5), 5.0).await;

        // Similarity falls back to the local cosine path
        let results = memory.find_similar(&pattern("buy", 100.5, 0.5)).await;
        assert_eq!(results.len(), 2);

        // Skill passthroughs degrade to empty defaults
        assert!(memory
            .crystallize_skill("scalper", "fast exits", json!({}), json!({}), 1)
            .await
            .is_none());
        assert!(memory.search_skills("scalper", 5, 0.5).await.is_empty());

        memory.close().await;
    }

    #[tokio::test]
    async fn test_hanging_backend_times_out_to_local_results() {
        let bus = Arc::new(CollectingEventBus::new());
        let config = PatternMemoryConfig {
            backend_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let memory = PatternMemory::with_backend(Arc::new(HangingBackend))
            .with_event_bus(bus.clone())
            .with_config(config);

        let entry = memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        assert_eq!(entry.id, EntryId(0));
        memory.store_pattern(pattern("buy", 101.0, 0.5), 5.0).await;

        // The stalled batch_similarity call must not block local ranking
        let results = memory.find_similar(&pattern("buy", 100.5, 0.5)).await;
        assert_eq!(results.len(), 2);

        // Every stalled call degrades: store_episode x2, add_causal_edge,
        // batch_similarity — all published with the timeout reason
        let degraded: Vec<String> = bus
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                MemoryEvent::BackendDegraded { operation, reason, .. } => {
                    assert_eq!(reason, "timeout");
                    Some(operation.clone())
                }
                _ => None,
            })
            .collect();

        assert_eq!(degraded.iter().filter(|op| *op == "store_episode").count(), 2);
        assert!(degraded.iter().any(|op| op == "add_causal_edge"));
        assert!(degraded.iter().any(|op| op == "batch_similarity"));
    }

    #[tokio::test]
    async fn test_backend_and_local_ranking_agree() {
        let local = seeded_store().await;
        let degraded = PatternMemory::with_backend(Arc::new(FailingBackend));
        degraded.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        degraded.store_pattern(pattern("sell", 110.0, -0.2), -5.0).await;
        degraded.store_pattern(pattern("buy", 105.0, 0.6), 20.0).await;

        let query = pattern("buy", 102.0, 0.5);
        let via_null = local.find_similar(&query).await;
        let via_fallback = degraded.find_similar(&query).await;

        assert_eq!(via_null.len(), via_fallback.len());
        for (a, b) in via_null.iter().zip(via_fallback.iter()) {
            assert_eq!(a.0.id, b.0.id);
            assert!((a.1 - b.1).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_events_published_on_ingest() {
        let bus = Arc::new(CollectingEventBus::new());
        let memory = PatternMemory::new().with_event_bus(bus.clone());

        memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        memory.store_pattern(pattern("sell", 110.0, -0.2), -5.0).await;

        let types = bus.event_types();
        assert_eq!(
            types,
            vec!["pattern_stored", "pattern_stored", "causal_edge_recorded"]
        );
    }

    #[tokio::test]
    async fn test_configurable_edge_constants() {
        let config = PatternMemoryConfig {
            edge_confidence: 0.5,
            edge_weight: 2.0,
            ..Default::default()
        };
        let memory = PatternMemory::new().with_config(config);

        memory.store_pattern(pattern("buy", 100.0, 0.5), 10.0).await;
        memory.store_pattern(pattern("sell", 110.0, 0.0), 5.0).await;

        let reasoning = memory.causal_reasoning("buy").await;
        assert_eq!(reasoning.causal_paths.len(), 1);
        assert_eq!(reasoning.causal_paths[0].confidence, 0.5);
        assert_eq!(reasoning.causal_paths[0].weight, 2.0);
    }

    #[tokio::test]
    async fn test_crystallize_skill_with_null_backend() {
        let memory = PatternMemory::new();
        let skill_id = memory
            .crystallize_skill("dip-buyer", "buys momentum dips", json!({}), json!({}), 1)
            .await;
        assert!(skill_id.is_some());
    }
}
