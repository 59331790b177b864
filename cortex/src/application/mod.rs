// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: the pattern memory façade.

pub mod memory_service;

pub use memory_service::{CausalReasoning, PatternMemory, PatternMemoryConfig, SelfCritique};
