// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository contracts defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve flows and checkpoints
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresCheckpointRepository** - Checkpoint snapshots with JSONB field maps
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests, development and embedding:
//! - **InMemoryFlowStore** - HashMap-backed flow records
//! - **InMemoryCheckpointRepository** - Per-flow checkpoint lists in creation order
//!
//! # Usage
//!
//! ```no_run
//! # async fn demo(database_url: &str) -> anyhow::Result<()> {
//! use flowguard_core::infrastructure::db::Database;
//! use flowguard_core::infrastructure::repositories::postgres_checkpoint::{
//!     PostgresCheckpointRepository,
//! };
//!
//! let db = Database::connect(database_url, 5).await?;
//! let repo = PostgresCheckpointRepository::new(db.pool().clone());
//! repo.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

pub mod postgres_checkpoint;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::checkpoint::{Checkpoint, CheckpointId};
use crate::domain::flow::{Flow, FlowId};
use crate::domain::repository::{CheckpointRepository, FlowStore, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryFlowStore {
    flows: Arc<RwLock<HashMap<FlowId, Flow>>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn find_by_id(&self, id: FlowId) -> Result<Option<Flow>, RepositoryError> {
        Ok(self.flows.read().get(&id).cloned())
    }

    async fn save(&self, flow: &Flow) -> Result<(), RepositoryError> {
        self.flows.write().insert(flow.id, flow.clone());
        Ok(())
    }

    async fn find_active(&self) -> Result<Vec<Flow>, RepositoryError> {
        Ok(self
            .flows
            .read()
            .values()
            .filter(|f| f.status.is_active())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Flow>, RepositoryError> {
        Ok(self.flows.read().values().cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCheckpointRepository {
    // Per-flow lists, oldest first
    checkpoints: Arc<RwLock<HashMap<FlowId, Vec<Checkpoint>>>>,
}

impl InMemoryCheckpointRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let mut checkpoints = self.checkpoints.write();
        // checkpoints are immutable once written
        if checkpoints.values().flatten().any(|c| c.id == checkpoint.id) {
            return Ok(());
        }
        checkpoints.entry(checkpoint.flow_id).or_default().push(checkpoint.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CheckpointId) -> Result<Option<Checkpoint>, RepositoryError> {
        let checkpoints = self.checkpoints.read();
        Ok(checkpoints
            .values()
            .flat_map(|list| list.iter())
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<Checkpoint>, RepositoryError> {
        Ok(self
            .checkpoints
            .read()
            .get(&flow_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, id: CheckpointId) -> Result<(), RepositoryError> {
        let mut checkpoints = self.checkpoints.write();
        for list in checkpoints.values_mut() {
            if let Some(pos) = list.iter().position(|c| c.id == id) {
                list.remove(pos);
                return Ok(());
            }
        }
        Err(RepositoryError::NotFound(format!("Checkpoint {} not found", id)))
    }

    async fn delete_by_flow(&self, flow_id: FlowId) -> Result<usize, RepositoryError> {
        Ok(self
            .checkpoints
            .write()
            .remove(&flow_id)
            .map(|list| list.len())
            .unwrap_or(0))
    }

    async fn prune(&self, flow_id: FlowId, keep: usize) -> Result<usize, RepositoryError> {
        let mut checkpoints = self.checkpoints.write();
        let Some(list) = checkpoints.get_mut(&flow_id) else {
            return Ok(0);
        };
        let excess = list.len().saturating_sub(keep);
        list.drain(..excess);
        Ok(excess)
    }
}
