// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Capability interface to the optional persistent backend.
//!
//! The façade holds exactly one [`CortexBackend`] and never branches on which
//! variant it is: [`NullBackend`] performs the local computation (or accepts
//! and drops writes), [`HttpBackend`] delegates to an external service over
//! JSON/HTTP. Every call is fallible here; the façade wraps each one in a
//! timeout and treats any failure as a degraded-mode condition, so backend
//! errors never reach callers of the store.

use async_trait::async_trait;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::causal::CausalEdge;
use crate::domain::pattern::EntryId;
use crate::domain::skill::{Skill, SkillId};
use crate::infrastructure::vector_index::cosine_similarity;

/// Typed failure for the HTTP-backed variant.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },
}

/// Episode payload forwarded to the external backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeUpload {
    pub session: String,
    pub action: String,
    pub score: f64,
    pub success: bool,
    pub note: String,
    pub state: serde_json::Value,
    pub meta: serde_json::Value,
    pub max_tokens_in: u32,
    pub max_tokens_out: u32,
}

/// Minimal capability set the store may forward to.
#[async_trait]
pub trait CortexBackend: Send + Sync {
    /// Register a reusable skill; returns its backend-assigned id.
    async fn create_skill(
        &self,
        name: &str,
        description: &str,
        input_schema: serde_json::Value,
        output_schema: serde_json::Value,
        version: u32,
    ) -> Result<SkillId>;

    /// Persist an episode.
    async fn store_episode(&self, upload: EpisodeUpload) -> Result<()>;

    /// Persist a causal edge.
    async fn add_causal_edge(&self, edge: &CausalEdge) -> Result<()>;

    /// Edges originating at `id`, as known to the backend.
    async fn query_causal_effects(&self, id: EntryId) -> Result<Vec<CausalEdge>>;

    /// Full-text skill search.
    async fn search_skills(&self, query: &str, limit: usize, min_score: f64)
        -> Result<Vec<Skill>>;

    /// Batch similarity scores between a query vector and stored vectors.
    /// Must match the reference cosine computation within 1e-6.
    async fn batch_similarity(&self, query: &[f32], vectors: &[Vec<f32>]) -> Result<Vec<f64>>;

    /// Release backend resources. Safe to call when nothing was ever attached.
    async fn close(&self) -> Result<()>;
}

/// Local variant: no persistence, reference similarity computation.
pub struct NullBackend;

#[async_trait]
impl CortexBackend for NullBackend {
    async fn create_skill(
        &self,
        _name: &str,
        _description: &str,
        _input_schema: serde_json::Value,
        _output_schema: serde_json::Value,
        _version: u32,
    ) -> Result<SkillId> {
        Ok(SkillId::new())
    }

    async fn store_episode(&self, _upload: EpisodeUpload) -> Result<()> {
        Ok(())
    }

    async fn add_causal_edge(&self, _edge: &CausalEdge) -> Result<()> {
        Ok(())
    }

    async fn query_causal_effects(&self, _id: EntryId) -> Result<Vec<CausalEdge>> {
        Ok(Vec::new())
    }

    async fn search_skills(
        &self,
        _query: &str,
        _limit: usize,
        _min_score: f64,
    ) -> Result<Vec<Skill>> {
        Ok(Vec::new())
    }

    async fn batch_similarity(&self, query: &[f32], vectors: &[Vec<f32>]) -> Result<Vec<f64>> {
        Ok(vectors
            .iter()
            .map(|vector| cosine_similarity(query, vector))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CreateSkillRequest<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: serde_json::Value,
    output_schema: serde_json::Value,
    version: u32,
}

#[derive(Debug, Deserialize)]
struct CreateSkillResponse {
    skill_id: SkillId,
}

#[derive(Debug, Serialize)]
struct SearchSkillsRequest<'a> {
    query: &'a str,
    limit: usize,
    min_score: f64,
}

#[derive(Debug, Serialize)]
struct BatchSimilarityRequest<'a> {
    query: &'a [f32],
    vectors: &'a [Vec<f32>],
}

#[derive(Debug, Deserialize)]
struct BatchSimilarityResponse {
    scores: Vec<f64>,
}

/// Remote variant delegating to an external persistence service.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create backend HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn check_status(endpoint: &str, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl CortexBackend for HttpBackend {
    async fn create_skill(
        &self,
        name: &str,
        description: &str,
        input_schema: serde_json::Value,
        output_schema: serde_json::Value,
        version: u32,
    ) -> Result<SkillId> {
        let response = self
            .client
            .post(self.url("skills"))
            .json(&CreateSkillRequest {
                name,
                description,
                input_schema,
                output_schema,
                version,
            })
            .send()
            .await
            .context("Failed to send create_skill request")?;

        Self::check_status("skills", &response)?;

        let body: CreateSkillResponse = response
            .json()
            .await
            .context("Failed to decode create_skill response")?;
        Ok(body.skill_id)
    }

    async fn store_episode(&self, upload: EpisodeUpload) -> Result<()> {
        let response = self
            .client
            .post(self.url("episodes"))
            .json(&upload)
            .send()
            .await
            .context("Failed to send store_episode request")?;

        Self::check_status("episodes", &response)
    }

    async fn add_causal_edge(&self, edge: &CausalEdge) -> Result<()> {
        let response = self
            .client
            .post(self.url("causal/edges"))
            .json(edge)
            .send()
            .await
            .context("Failed to send add_causal_edge request")?;

        Self::check_status("causal/edges", &response)
    }

    async fn query_causal_effects(&self, id: EntryId) -> Result<Vec<CausalEdge>> {
        let endpoint = format!("causal/effects/{}", id);
        let response = self
            .client
            .get(self.url(&endpoint))
            .send()
            .await
            .context("Failed to send query_causal_effects request")?;

        Self::check_status(&endpoint, &response)?;

        response
            .json()
            .await
            .context("Failed to decode query_causal_effects response")
    }

    async fn search_skills(
        &self,
        query: &str,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<Skill>> {
        let response = self
            .client
            .post(self.url("skills/search"))
            .json(&SearchSkillsRequest {
                query,
                limit,
                min_score,
            })
            .send()
            .await
            .context("Failed to send search_skills request")?;

        Self::check_status("skills/search", &response)?;

        response
            .json()
            .await
            .context("Failed to decode search_skills response")
    }

    async fn batch_similarity(&self, query: &[f32], vectors: &[Vec<f32>]) -> Result<Vec<f64>> {
        let response = self
            .client
            .post(self.url("similarity/batch"))
            .json(&BatchSimilarityRequest { query, vectors })
            .send()
            .await
            .context("Failed to send batch_similarity request")?;

        Self::check_status("similarity/batch", &response)?;

        let body: BatchSimilarityResponse = response
            .json()
            .await
            .context("Failed to decode batch_similarity response")?;
        Ok(body.scores)
    }

    async fn close(&self) -> Result<()> {
        // Connection pool is released on drop; nothing to flush server-side.
        Ok(())
    }
}
