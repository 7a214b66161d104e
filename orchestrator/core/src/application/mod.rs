// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod retry_executor;
pub mod checkpoint_manager;
pub mod recovery_orchestrator;
pub mod health_monitor;
pub mod tenant_pool;
pub mod repository_factory;
pub mod resilience_core;

// Re-export services for convenience
pub use retry_executor::{retry_with_backoff, RetryError};
pub use checkpoint_manager::CheckpointManager;
pub use recovery_orchestrator::{FlowErrorRecoveryOrchestrator, PhaseExecutor};
pub use health_monitor::{FlowHealthMonitor, HealthMonitorError, ScanReport};
pub use tenant_pool::{PoolError, TenantAgentPool};
pub use repository_factory::create_checkpoint_repository;
pub use resilience_core::ResilienceCore;
