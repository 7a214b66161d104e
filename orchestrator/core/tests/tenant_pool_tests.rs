// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use flowguard_core::application::TenantAgentPool;
use flowguard_core::domain::config::PoolConfig;
use flowguard_core::domain::error_classification::PhaseError;
use flowguard_core::domain::events::PoolEvent;
use flowguard_core::domain::tenant::{AgentContext, AgentFactory, TenantAgent, TenantKey};
use flowguard_core::infrastructure::event_bus::{EventBus, ResilienceEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct InventoryAgent;

#[async_trait]
impl TenantAgent for InventoryAgent {
    fn capability(&self) -> &str {
        "asset_inventory"
    }

    async fn execute(&self, task: &str) -> Result<serde_json::Value, PhaseError> {
        Ok(serde_json::json!({ "handled": task }))
    }
}

/// Slow factory so concurrent callers overlap on construction.
struct SlowFactory {
    constructions: AtomicU32,
}

#[async_trait]
impl AgentFactory for SlowFactory {
    async fn create_agent(
        &self,
        _tenant: &TenantKey,
        _capability: &str,
        _context: &AgentContext,
    ) -> Result<Arc<dyn TenantAgent>, PhaseError> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok(Arc::new(InventoryAgent))
    }
}

fn pool(idle_threshold: Duration) -> (Arc<TenantAgentPool>, Arc<SlowFactory>, EventBus) {
    let factory = Arc::new(SlowFactory {
        constructions: AtomicU32::new(0),
    });
    let bus = EventBus::new(128);
    let config = PoolConfig {
        idle_threshold,
        ..Default::default()
    };
    (
        Arc::new(TenantAgentPool::new(factory.clone(), config, bus.clone())),
        factory,
        bus,
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_constructs_exactly_once() {
    let (pool, factory, _) = pool(Duration::from_secs(3600));
    let tenant = TenantKey::new("globex", "migration-2026");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let tenant = tenant.clone();
            tokio::spawn(async move {
                match pool.get_or_create_agent(&tenant, "asset_inventory", false).await {
                    Ok(agent) => agent,
                    Err(e) => panic!("agent creation failed: {e}"),
                }
            })
        })
        .collect();

    let mut agents = Vec::new();
    for handle in handles {
        agents.push(handle.await.unwrap());
    }

    assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    assert!(agents.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    let again = pool.get_or_create_agent(&tenant, "asset_inventory", false).await;
    assert!(matches!(again, Ok(agent) if Arc::ptr_eq(&agent, &agents[0])));
}

#[tokio::test]
async fn idle_sweep_evicts_stale_tenants_and_keeps_active_ones() {
    let (pool, _, bus) = pool(Duration::from_millis(100));
    let idle = TenantKey::new("initech", "eng-1");
    let active = TenantKey::new("initech", "eng-2");
    let mut events = bus.subscribe();

    pool.execute_task(&idle, "asset_inventory", "scan").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    pool.execute_task(&active, "asset_inventory", "scan").await.unwrap();

    let evicted = pool.sweep_idle(Utc::now());
    assert_eq!(evicted, vec![idle]);
    assert_eq!(pool.tenant_count(), 1);
    assert_eq!(pool.get_pool_statistics()[0].tenant, active);

    // far enough ahead, everything is idle
    let evicted = pool.sweep_idle(Utc::now() + ChronoDuration::hours(1));
    assert_eq!(evicted, vec![active]);
    assert_eq!(pool.tenant_count(), 0);

    let mut evictions = 0;
    while let Ok(event) = events.try_recv() {
        if let ResilienceEvent::Pool(PoolEvent::TenantEvicted { .. }) = event {
            evictions += 1;
        }
    }
    assert_eq!(evictions, 2);
}
