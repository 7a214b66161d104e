// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Resilience core for long-running, multi-phase, multi-tenant flows:
//! error classification and backoff retry, phase checkpoints, a background
//! health monitor, a failure recovery orchestrator and a tenant-scoped
//! agent pool.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Exposes the domain, application and infrastructure layers

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
