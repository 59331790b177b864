// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: storage structures and the optional backend.

pub mod vector_index;
pub mod episode_store;
pub mod backend;

pub use vector_index::{cosine_similarity, VectorIndex};
pub use episode_store::{Episode, EpisodeStore};
pub use backend::{BackendError, CortexBackend, EpisodeUpload, HttpBackend, NullBackend};
