// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the resilience core. The interfaces live
//! in the domain layer; implementations live in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `FlowStore` | `Flow` | `InMemoryFlowStore` (the host service normally supplies its own) |
//! | `CheckpointRepository` | `Checkpoint` | `InMemoryCheckpointRepository`, Postgres |
//!
//! ## Storage Backend Abstraction
//!
//! The checkpoint backend is selected at startup from the `checkpoints.backend`
//! config key (see `application::repository_factory`). In-memory storage is
//! used for development and tests; PostgreSQL for production.

use async_trait::async_trait;

use crate::domain::checkpoint::{Checkpoint, CheckpointId};
use crate::domain::flow::{Flow, FlowId};

/// Read/write access to flow records owned by the host service.
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn find_by_id(&self, id: FlowId) -> Result<Option<Flow>, RepositoryError>;

    /// Save flow (create or update)
    async fn save(&self, flow: &Flow) -> Result<(), RepositoryError>;

    /// Flows that are neither completed nor cancelled
    async fn find_active(&self) -> Result<Vec<Flow>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Flow>, RepositoryError>;
}

/// Repository interface for Checkpoint aggregates
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: CheckpointId) -> Result<Option<Checkpoint>, RepositoryError>;

    /// All checkpoints of a flow, oldest first
    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<Checkpoint>, RepositoryError>;

    async fn delete(&self, id: CheckpointId) -> Result<(), RepositoryError>;

    /// Returns the number of checkpoints removed
    async fn delete_by_flow(&self, flow_id: FlowId) -> Result<usize, RepositoryError>;

    /// Keeps the `keep` newest checkpoints of a flow and deletes the rest.
    /// Returns the number of checkpoints removed.
    async fn prune(&self, flow_id: FlowId, keep: usize) -> Result<usize, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
