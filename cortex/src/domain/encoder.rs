// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0

//! Feature encoder: maps a [`PatternRecord`] to a fixed-length vector.
//!
//! Layout of the 128-dimensional vector:
//! - dims 0..5: normalized scalar features (price, volume, momentum, cash, positions)
//! - dims 5..5+|vocabulary|: one-hot encoding of the action
//! - remaining dims: zero, reserved for future features
//!
//! Encoding is pure and deterministic; an action outside the vocabulary
//! leaves the one-hot slice all-zero rather than failing.

use crate::domain::pattern::PatternRecord;

/// Fixed dimensionality of every feature vector.
pub const FEATURE_DIM: usize = 128;

/// Ordered action vocabulary for the one-hot slice.
pub const ACTION_VOCABULARY: [&str; 3] = ["buy", "sell", "hold"];

/// First dimension of the one-hot action slice.
const ACTION_OFFSET: usize = 5;

const PRICE_SCALE: f64 = 1_000.0;
const VOLUME_SCALE: f64 = 10_000.0;
const CASH_SCALE: f64 = 100_000.0;

/// Encode a pattern into its feature vector. Never fails.
pub fn encode(pattern: &PatternRecord) -> Vec<f32> {
    let mut features = vec![0.0f32; FEATURE_DIM];

    features[0] = (pattern.price / PRICE_SCALE) as f32;
    features[1] = (pattern.volume / VOLUME_SCALE) as f32;
    features[2] = pattern.momentum as f32;
    features[3] = (pattern.cash / CASH_SCALE) as f32;
    features[4] = pattern.positions as f32;

    if let Some(slot) = ACTION_VOCABULARY.iter().position(|a| *a == pattern.action) {
        features[ACTION_OFFSET + slot] = 1.0;
    }

    features
}
