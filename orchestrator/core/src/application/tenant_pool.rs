// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Agent Pool
//!
//! Keeps one long-lived agent per (tenant, capability). Agents are built by
//! an injected [`AgentFactory`] on first use and cached until the tenant is
//! removed or evicted for inactivity.
//!
//! Each capability slot is a `tokio::sync::OnceCell`; the map lock is only
//! held to find or insert the cell, and construction happens outside it.
//! Concurrent first callers for the same slot therefore share one factory
//! call, while callers for other tenants never wait on it.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Tenant-scoped agent reuse with idle eviction

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::config::PoolConfig;
use crate::domain::error_classification::PhaseError;
use crate::domain::events::PoolEvent;
use crate::domain::tenant::{AgentContext, AgentFactory, TenantAgent, TenantKey, TenantPoolStats};
use crate::infrastructure::event_bus::EventBus;

type AgentSlot = Arc<OnceCell<Arc<dyn TenantAgent>>>;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to create agent '{capability}' for tenant {tenant}: {source}")]
    Creation {
        tenant: TenantKey,
        capability: String,
        source: PhaseError,
    },

    #[error("Agent '{capability}' for tenant {tenant} failed: {source}")]
    Execution {
        tenant: TenantKey,
        capability: String,
        source: PhaseError,
    },
}

impl PoolError {
    /// The underlying failure, for classification.
    pub fn phase_error(&self) -> &PhaseError {
        match self {
            PoolError::Creation { source, .. } | PoolError::Execution { source, .. } => source,
        }
    }
}

struct TenantEntry {
    agents: HashMap<String, AgentSlot>,
    agents_created: u64,
    total_requests: u64,
    total_errors: u64,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl TenantEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            agents: HashMap::new(),
            agents_created: 0,
            total_requests: 0,
            total_errors: 0,
            created_at: now,
            last_activity: now,
        }
    }

    fn stats(&self, tenant: &TenantKey) -> TenantPoolStats {
        let live: Vec<(&String, &Arc<dyn TenantAgent>)> = self
            .agents
            .iter()
            .filter_map(|(capability, slot)| slot.get().map(|agent| (capability, agent)))
            .collect();

        let mut capabilities: Vec<String> = live.iter().map(|(c, _)| (*c).clone()).collect();
        capabilities.sort();

        TenantPoolStats {
            tenant: tenant.clone(),
            agent_count: live.len(),
            capabilities,
            agents_created: self.agents_created,
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            memory_usage_bytes: live.iter().map(|(_, a)| a.approximate_memory_bytes()).sum(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

pub struct TenantAgentPool {
    factory: Arc<dyn AgentFactory>,
    config: PoolConfig,
    event_bus: EventBus,
    entries: Mutex<HashMap<TenantKey, TenantEntry>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TenantAgentPool {
    pub fn new(factory: Arc<dyn AgentFactory>, config: PoolConfig, event_bus: EventBus) -> Self {
        Self {
            factory,
            config,
            event_bus,
            entries: Mutex::new(HashMap::new()),
            task: Mutex::new(None),
        }
    }

    /// Returns the pooled agent for (tenant, capability), building it on
    /// first use or when `force_recreate` is set.
    pub async fn get_or_create_agent(
        &self,
        tenant: &TenantKey,
        capability: &str,
        force_recreate: bool,
    ) -> Result<Arc<dyn TenantAgent>, PoolError> {
        let slot = {
            let mut entries = self.entries.lock();
            let entry = entries
                .entry(tenant.clone())
                .or_insert_with(|| TenantEntry::new(Utc::now()));
            entry.last_activity = Utc::now();

            if force_recreate {
                let fresh: AgentSlot = Arc::new(OnceCell::new());
                entry.agents.insert(capability.to_string(), fresh.clone());
                fresh
            } else {
                entry
                    .agents
                    .entry(capability.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone()
            }
        };

        let constructed = AtomicBool::new(false);
        let result = slot
            .get_or_try_init(|| async {
                constructed.store(true, Ordering::Relaxed);
                let context = Self::context_for(tenant);
                self.factory.create_agent(tenant, capability, &context).await
            })
            .await;

        match result {
            Ok(agent) => {
                if constructed.load(Ordering::Relaxed) {
                    self.record_construction(tenant, capability, force_recreate);
                }
                Ok(agent.clone())
            }
            Err(source) => {
                warn!(tenant = %tenant, capability, error = %source, "Agent creation failed");
                self.event_bus.publish_pool_event(PoolEvent::AgentCreationFailed {
                    tenant: tenant.clone(),
                    capability: capability.to_string(),
                    reason: source.to_string(),
                    failed_at: Utc::now(),
                });
                Err(PoolError::Creation {
                    tenant: tenant.clone(),
                    capability: capability.to_string(),
                    source,
                })
            }
        }
    }

    fn context_for(tenant: &TenantKey) -> AgentContext {
        AgentContext {
            attributes: HashMap::from([
                ("client_account_id".to_string(), tenant.client_account_id.clone()),
                ("engagement_id".to_string(), tenant.engagement_id.clone()),
            ]),
        }
    }

    fn record_construction(&self, tenant: &TenantKey, capability: &str, recreated: bool) {
        if let Some(entry) = self.entries.lock().get_mut(tenant) {
            entry.agents_created += 1;
        }

        info!(tenant = %tenant, capability, recreated, "Agent created");
        metrics::counter!("flowguard_pool_agents_created_total").increment(1);
        self.event_bus.publish_pool_event(PoolEvent::AgentCreated {
            tenant: tenant.clone(),
            capability: capability.to_string(),
            recreated,
            created_at: Utc::now(),
        });
    }

    /// Runs `task` on the pooled agent and records the request.
    pub async fn execute_task(
        &self,
        tenant: &TenantKey,
        capability: &str,
        task: &str,
    ) -> Result<serde_json::Value, PoolError> {
        let agent = self.get_or_create_agent(tenant, capability, false).await?;
        let result = agent.execute(task).await;

        if let Some(entry) = self.entries.lock().get_mut(tenant) {
            entry.total_requests += 1;
            if result.is_err() {
                entry.total_errors += 1;
            }
            entry.last_activity = Utc::now();
        }

        result.map_err(|source| PoolError::Execution {
            tenant: tenant.clone(),
            capability: capability.to_string(),
            source,
        })
    }

    /// Snapshot of every live tenant entry, ordered by tenant.
    pub fn get_pool_statistics(&self) -> Vec<TenantPoolStats> {
        let entries = self.entries.lock();
        let mut stats: Vec<TenantPoolStats> = entries.iter().map(|(k, e)| e.stats(k)).collect();
        stats.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        stats
    }

    pub fn tenant_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drops a tenant and all of its agents. Returns whether it existed.
    pub fn remove_tenant(&self, tenant: &TenantKey) -> bool {
        if self.entries.lock().remove(tenant).is_none() {
            return false;
        }
        info!(tenant = %tenant, "Tenant removed from pool");
        self.event_bus.publish_pool_event(PoolEvent::TenantRemoved {
            tenant: tenant.clone(),
            removed_at: Utc::now(),
        });
        true
    }

    /// Evicts tenants idle longer than the threshold as of `now`.
    pub fn sweep_idle(&self, now: DateTime<Utc>) -> Vec<TenantKey> {
        let threshold = self.config.idle_threshold;
        let evicted: Vec<(TenantKey, TenantEntry)> = {
            let mut entries = self.entries.lock();
            let idle: Vec<TenantKey> = entries
                .iter()
                .filter(|(_, e)| {
                    (now - e.last_activity)
                        .to_std()
                        .map(|idle| idle > threshold)
                        .unwrap_or(false)
                })
                .map(|(k, _)| k.clone())
                .collect();
            idle.into_iter()
                .filter_map(|k| entries.remove(&k).map(|e| (k, e)))
                .collect()
        };

        for (tenant, entry) in &evicted {
            let idle_secs = (now - entry.last_activity).num_seconds().max(0) as u64;
            info!(tenant = %tenant, idle_secs, agents = entry.agents.len(), "Evicted idle tenant");
            metrics::counter!("flowguard_pool_evictions_total").increment(1);
            self.event_bus.publish_pool_event(PoolEvent::TenantEvicted {
                tenant: tenant.clone(),
                idle_secs,
                agent_count: entry.agents.len(),
                evicted_at: now,
            });
        }

        evicted.into_iter().map(|(k, _)| k).collect()
    }

    /// Spawns the idle-eviction loop. Returns `false` when disabled or
    /// already running.
    pub fn start_cleanup(self: &Arc<Self>) -> bool {
        if !self.config.enabled {
            info!("Tenant pool cleanup is disabled");
            return false;
        }
        if self.config.sweep_interval.is_zero() {
            error!("Tenant pool cleanup not started: sweep_interval is zero");
            return false;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let pool = Arc::clone(self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { pool.run_cleanup(loop_token).await });
        *task = Some((token, handle));
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    async fn run_cleanup(&self, shutdown: CancellationToken) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            idle_threshold_secs = self.config.idle_threshold.as_secs(),
            "Starting tenant pool cleanup"
        );

        let mut tick = interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let evicted = self.sweep_idle(Utc::now());
                    debug!(evicted = evicted.len(), "Tenant pool sweep completed");
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping tenant pool cleanup");
                    break;
                }
            }
        }

        info!("Tenant pool cleanup stopped");
    }

    /// Cancels the eviction loop and waits for it to exit.
    pub async fn shutdown(&self) {
        let Some((token, handle)) = self.task.lock().take() else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            warn!("Tenant pool cleanup task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    struct EchoAgent {
        capability: String,
    }

    #[async_trait]
    impl TenantAgent for EchoAgent {
        fn capability(&self) -> &str {
            &self.capability
        }

        async fn execute(&self, task: &str) -> Result<serde_json::Value, PhaseError> {
            if task == "fail" {
                return Err(PhaseError::timeout("agent timed out"));
            }
            Ok(json!({ "capability": self.capability, "task": task }))
        }

        fn approximate_memory_bytes(&self) -> u64 {
            1024
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicU32,
        failures_left: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl AgentFactory for CountingFactory {
        async fn create_agent(
            &self,
            _tenant: &TenantKey,
            capability: &str,
            context: &AgentContext,
        ) -> Result<Arc<dyn TenantAgent>, PhaseError> {
            assert!(context.attributes.contains_key("engagement_id"));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(PhaseError::resource_exhausted("out of memory"));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoAgent {
                capability: capability.to_string(),
            }))
        }
    }

    fn pool_with(factory: Arc<CountingFactory>, config: PoolConfig) -> Arc<TenantAgentPool> {
        Arc::new(TenantAgentPool::new(factory, config, EventBus::new(64)))
    }

    fn tenant(engagement: &str) -> TenantKey {
        TenantKey::new("acme", engagement)
    }

    #[tokio::test]
    async fn test_same_key_returns_same_agent() {
        let factory = Arc::new(CountingFactory::default());
        let pool = pool_with(factory.clone(), PoolConfig::default());

        let a = pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.unwrap();
        let b = pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        let other = pool.get_or_create_agent(&tenant("e2"), "mapping", false).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(pool.tenant_count(), 2);
    }

    #[tokio::test]
    async fn test_force_recreate_builds_new_agent() {
        let factory = Arc::new(CountingFactory::default());
        let pool = pool_with(factory.clone(), PoolConfig::default());

        let a = pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.unwrap();
        let b = pool.get_or_create_agent(&tenant("e1"), "mapping", true).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        let stats = pool.get_pool_statistics();
        assert_eq!(stats[0].agents_created, 2);
        assert_eq!(stats[0].agent_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_first_access_constructs_once() {
        let factory = Arc::new(CountingFactory {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let pool = pool_with(factory.clone(), PoolConfig::default());
        let key = tenant("e1");

        let (a, b) = tokio::join!(
            pool.get_or_create_agent(&key, "inventory", false),
            pool.get_or_create_agent(&key, "inventory", false),
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.get_pool_statistics()[0].agents_created, 1);
    }

    #[tokio::test]
    async fn test_creation_failure_is_retried_on_next_call() {
        let factory = Arc::new(CountingFactory {
            failures_left: AtomicU32::new(1),
            ..Default::default()
        });
        let pool = pool_with(factory.clone(), PoolConfig::default());

        let err = match pool.get_or_create_agent(&tenant("e1"), "mapping", false).await {
            Err(e) => e,
            Ok(_) => panic!("expected creation failure"),
        };
        assert!(matches!(err, PoolError::Creation { .. }));
        assert_eq!(err.phase_error().message, "out of memory");

        assert!(pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.is_ok());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_task_tracks_statistics() {
        let pool = pool_with(Arc::new(CountingFactory::default()), PoolConfig::default());
        let key = tenant("e1");

        let out = pool.execute_task(&key, "cleansing", "normalize").await.unwrap();
        assert_eq!(out["task"], json!("normalize"));
        assert!(matches!(
            pool.execute_task(&key, "cleansing", "fail").await,
            Err(PoolError::Execution { .. })
        ));
        pool.execute_task(&key, "mapping", "map").await.unwrap();

        let stats = &pool.get_pool_statistics()[0];
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_errors, 1);
        assert_eq!(stats.capabilities, vec!["cleansing".to_string(), "mapping".to_string()]);
        assert_eq!(stats.memory_usage_bytes, 2048);
        assert!((stats.error_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_idle_tenants() {
        let pool = pool_with(Arc::new(CountingFactory::default()), PoolConfig::default());
        pool.get_or_create_agent(&tenant("stale"), "mapping", false).await.unwrap();
        pool.get_or_create_agent(&tenant("fresh"), "mapping", false).await.unwrap();

        if let Some(entry) = pool.entries.lock().get_mut(&tenant("stale")) {
            entry.last_activity = Utc::now() - ChronoDuration::hours(25);
        }

        let evicted = pool.sweep_idle(Utc::now());
        assert_eq!(evicted, vec![tenant("stale")]);
        let remaining: Vec<TenantKey> =
            pool.get_pool_statistics().into_iter().map(|s| s.tenant).collect();
        assert_eq!(remaining, vec![tenant("fresh")]);
    }

    #[tokio::test]
    async fn test_remove_tenant() {
        let pool = pool_with(Arc::new(CountingFactory::default()), PoolConfig::default());
        pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.unwrap();
        assert!(pool.remove_tenant(&tenant("e1")));
        assert!(!pool.remove_tenant(&tenant("e1")));
        assert_eq!(pool.tenant_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_does_not_start() {
        let pool = pool_with(
            Arc::new(CountingFactory::default()),
            PoolConfig {
                sweep_interval: Duration::ZERO,
                ..Default::default()
            },
        );
        assert!(!pool.start_cleanup());
        assert!(!pool.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_loop_evicts_and_shuts_down() {
        let pool = pool_with(
            Arc::new(CountingFactory::default()),
            PoolConfig {
                sweep_interval: Duration::from_secs(60),
                ..Default::default()
            },
        );
        pool.get_or_create_agent(&tenant("e1"), "mapping", false).await.unwrap();
        if let Some(entry) = pool.entries.lock().get_mut(&tenant("e1")) {
            entry.last_activity = Utc::now() - ChronoDuration::days(2);
        }

        assert!(pool.start_cleanup());
        assert!(!pool.start_cleanup());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.tenant_count(), 0);

        pool.shutdown().await;
        assert!(!pool.is_running());
    }
}
