// Copyright (c) 2026 trade-cortex contributors
// SPDX-License-Identifier: AGPL-3.0
//! # trade-cortex
//!
//! In-process pattern memory store: records discrete decision events with
//! their numeric outcomes, encodes each as a fixed-length feature vector,
//! and answers similarity and cause→effect queries over the working set.
//!
//! # Architecture
//!
//! - **Domain:** pattern entities, feature encoding, causal chain, events
//! - **Infrastructure:** vector index, episode log, optional backend
//! - **Application:** the [`PatternMemory`](application::PatternMemory) façade

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::*;
