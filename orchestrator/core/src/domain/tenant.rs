// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Tenant Scoping Types
//!
//! A tenant is an isolation boundary formed by a client account and an
//! engagement. Long-lived agents are pooled per (tenant, capability); the
//! agent body itself is opaque to this crate and is produced by an external
//! [`AgentFactory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::error_classification::PhaseError;

/// (client account, engagement) pair scoping pooled resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantKey {
    pub client_account_id: String,
    pub engagement_id: String,
}

impl TenantKey {
    pub fn new(client_account_id: impl Into<String>, engagement_id: impl Into<String>) -> Self {
        Self {
            client_account_id: client_account_id.into(),
            engagement_id: engagement_id.into(),
        }
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.client_account_id, self.engagement_id)
    }
}

/// Context handed to the factory when an agent is constructed.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub attributes: HashMap<String, String>,
}

/// A persistent, capability-bound worker.
///
/// What an agent computes is outside this crate; the pool only needs to run
/// a task and estimate the agent's memory footprint.
#[async_trait]
pub trait TenantAgent: Send + Sync {
    fn capability(&self) -> &str;

    async fn execute(&self, task: &str) -> Result<serde_json::Value, PhaseError>;

    /// Approximate resident memory held by this agent, in bytes.
    fn approximate_memory_bytes(&self) -> u64 {
        0
    }
}

/// Builds agents for the pool. May fail; failures are classified like any
/// other [`PhaseError`].
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create_agent(
        &self,
        tenant: &TenantKey,
        capability: &str,
        context: &AgentContext,
    ) -> Result<std::sync::Arc<dyn TenantAgent>, PhaseError>;
}

/// Snapshot of one live tenant pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPoolStats {
    pub tenant: TenantKey,
    pub capabilities: Vec<String>,
    pub agent_count: usize,
    pub agents_created: u64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub memory_usage_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl TenantPoolStats {
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_key_display() {
        let key = TenantKey::new("acme", "eng-42");
        assert_eq!(key.to_string(), "acme/eng-42");
    }

    #[test]
    fn test_error_rate() {
        let now = Utc::now();
        let mut stats = TenantPoolStats {
            tenant: TenantKey::new("a", "b"),
            capabilities: vec![],
            agent_count: 0,
            agents_created: 0,
            total_requests: 0,
            total_errors: 0,
            memory_usage_bytes: 0,
            created_at: now,
            last_activity: now,
        };
        assert_eq!(stats.error_rate(), 0.0);
        stats.total_requests = 4;
        stats.total_errors = 1;
        assert_eq!(stats.error_rate(), 0.25);
    }
}
