// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Resilience Core - composition root
//!
//! Builds every resilience service from one [`ResilienceConfigManifest`]
//! and owns their lifecycle. All services share one [`EventBus`] and one
//! [`CheckpointManager`]; nothing is kept in process-wide statics.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use flowguard_core::domain::tenant::AgentFactory;
//! # async fn demo(factory: Arc<dyn AgentFactory>) -> anyhow::Result<()> {
//! use flowguard_core::application::{create_checkpoint_repository, ResilienceCore};
//! use flowguard_core::domain::config::ResilienceConfigManifest;
//! use flowguard_core::infrastructure::InMemoryFlowStore;
//!
//! let config = ResilienceConfigManifest::load_or_default(None)?;
//! let checkpoints = create_checkpoint_repository(&config.spec.checkpoints).await?;
//! let flows = Arc::new(InMemoryFlowStore::new());
//! let core = ResilienceCore::new(config, flows, checkpoints, factory)?;
//! core.start();
//! // ...
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Construction, start-up and graceful shutdown of the resilience services

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::application::checkpoint_manager::CheckpointManager;
use crate::application::health_monitor::FlowHealthMonitor;
use crate::application::recovery_orchestrator::FlowErrorRecoveryOrchestrator;
use crate::application::tenant_pool::TenantAgentPool;
use crate::domain::config::ResilienceConfigManifest;
use crate::domain::repository::{CheckpointRepository, FlowStore};
use crate::domain::tenant::AgentFactory;
use crate::infrastructure::event_bus::EventBus;

pub struct ResilienceCore {
    config: ResilienceConfigManifest,
    event_bus: EventBus,
    checkpoints: Arc<CheckpointManager>,
    recovery: Arc<FlowErrorRecoveryOrchestrator>,
    health: Arc<FlowHealthMonitor>,
    pool: Arc<TenantAgentPool>,
}

impl ResilienceCore {
    /// Validates `config` and wires the services. Nothing is started yet.
    pub fn new(
        config: ResilienceConfigManifest,
        flow_store: Arc<dyn FlowStore>,
        checkpoint_repository: Arc<dyn CheckpointRepository>,
        agent_factory: Arc<dyn AgentFactory>,
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid resilience configuration")?;
        let spec = &config.spec;
        let event_bus = EventBus::with_default_capacity();

        let checkpoints = Arc::new(CheckpointManager::new(
            checkpoint_repository,
            spec.checkpoints.clone(),
            event_bus.clone(),
        ));
        let recovery = Arc::new(FlowErrorRecoveryOrchestrator::new(
            checkpoints.clone(),
            spec.retry.clone(),
            spec.recovery.clone(),
            event_bus.clone(),
        ));
        let health = Arc::new(FlowHealthMonitor::new(
            flow_store,
            checkpoints.clone(),
            spec.health.clone(),
            event_bus.clone(),
        ));
        let pool = Arc::new(TenantAgentPool::new(
            agent_factory,
            spec.pool.clone(),
            event_bus.clone(),
        ));

        Ok(Self {
            config,
            event_bus,
            checkpoints,
            recovery,
            health,
            pool,
        })
    }

    /// Launches the health scan and idle-eviction loops (each only when enabled).
    pub fn start(&self) {
        let monitoring = self.health.start_monitoring();
        let cleanup = self.pool.start_cleanup();
        info!(
            config = %self.config.metadata.name,
            health_monitor = monitoring,
            pool_cleanup = cleanup,
            "Resilience core started"
        );
    }

    /// Cancels both background loops and waits for them to finish.
    pub async fn shutdown(&self) {
        tokio::join!(self.health.stop_monitoring(), self.pool.shutdown());
        info!("Resilience core stopped");
    }

    pub fn config(&self) -> &ResilienceConfigManifest {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointManager> {
        &self.checkpoints
    }

    pub fn recovery(&self) -> &Arc<FlowErrorRecoveryOrchestrator> {
        &self.recovery
    }

    pub fn health(&self) -> &Arc<FlowHealthMonitor> {
        &self.health
    }

    pub fn pool(&self) -> &Arc<TenantAgentPool> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error_classification::PhaseError;
    use crate::domain::tenant::{AgentContext, TenantAgent, TenantKey};
    use crate::infrastructure::repositories::{InMemoryCheckpointRepository, InMemoryFlowStore};
    use async_trait::async_trait;

    struct NoAgents;

    #[async_trait]
    impl AgentFactory for NoAgents {
        async fn create_agent(
            &self,
            _tenant: &TenantKey,
            _capability: &str,
            _context: &AgentContext,
        ) -> Result<Arc<dyn TenantAgent>, PhaseError> {
            Err(PhaseError::new("FactoryError", "no agents in this process"))
        }
    }

    fn core(config: ResilienceConfigManifest) -> ResilienceCore {
        ResilienceCore::new(
            config,
            Arc::new(InMemoryFlowStore::new()),
            Arc::new(InMemoryCheckpointRepository::new()),
            Arc::new(NoAgents),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_shutdown() {
        let core = core(ResilienceConfigManifest::default());
        core.start();
        assert!(core.health().is_running());
        assert!(core.pool().is_running());

        core.shutdown().await;
        assert!(!core.health().is_running());
        assert!(!core.pool().is_running());
    }

    #[tokio::test]
    async fn test_disabled_loops_stay_stopped() {
        let mut config = ResilienceConfigManifest::default();
        config.spec.health.enabled = false;
        config.spec.pool.enabled = false;
        let core = core(config);

        core.start();
        assert!(!core.health().is_running());
        assert!(!core.pool().is_running());
        core.shutdown().await;
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ResilienceConfigManifest::default();
        config.spec.health.scan_interval = std::time::Duration::ZERO;
        let result = ResilienceCore::new(
            config,
            Arc::new(InMemoryFlowStore::new()),
            Arc::new(InMemoryCheckpointRepository::new()),
            Arc::new(NoAgents),
        );
        let err = result.err().unwrap();
        assert!(format!("{:#}", err).contains("scan_interval"));

        let mut config = ResilienceConfigManifest::default();
        config.spec.pool.sweep_interval = std::time::Duration::ZERO;
        let result = ResilienceCore::new(
            config,
            Arc::new(InMemoryFlowStore::new()),
            Arc::new(InMemoryCheckpointRepository::new()),
            Arc::new(NoAgents),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_services_share_configuration() {
        let mut config = ResilienceConfigManifest::default();
        config.spec.checkpoints.retention = 2;
        let core = core(config);
        assert_eq!(core.checkpoints().config().retention, 2);
        assert_eq!(core.health().config(), &core.config().spec.health);
    }
}
