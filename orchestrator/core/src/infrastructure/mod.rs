// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod repositories;

pub use event_bus::{EventBus, ResilienceEvent};
pub use repositories::{InMemoryCheckpointRepository, InMemoryFlowStore};
