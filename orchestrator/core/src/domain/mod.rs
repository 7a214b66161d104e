// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pure types and decision functions for flow resilience: flows, error
//! classification, retry policy, checkpoints, health assessment, recovery
//! results, tenant pool types, events, repository contracts and config.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** No I/O; everything here is usable from tests without a runtime

pub mod checkpoint;
pub mod config;
pub mod error_classification;
pub mod events;
pub mod flow;
pub mod health;
pub mod recovery;
pub mod repository;
pub mod retry;
pub mod tenant;
