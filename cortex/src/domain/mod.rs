// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: pure data types and pure computation.

pub mod pattern;
pub mod encoder;
pub mod causal;
pub mod skill;
pub mod events;

pub use pattern::*;
pub use encoder::{encode, ACTION_VOCABULARY, FEATURE_DIM};
pub use causal::*;
pub use skill::*;
pub use events::*;
