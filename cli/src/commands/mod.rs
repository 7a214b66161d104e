// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the flowguard CLI

pub mod backoff;
pub mod classify;
pub mod config;

pub use self::config::ConfigCommand;
