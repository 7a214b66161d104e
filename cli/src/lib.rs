// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! flowguard CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Operator commands over the resilience configuration and policies

pub mod commands;
