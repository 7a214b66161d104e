// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the checkpoint repository selected by `checkpoints.backend`, so
//! the domain layer stays free of infrastructure dependencies.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Backend selection for checkpoint persistence

use std::sync::Arc;

use crate::domain::config::{CheckpointBackend, CheckpointConfig};
use crate::domain::repository::CheckpointRepository;
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_checkpoint::PostgresCheckpointRepository;
use crate::infrastructure::repositories::InMemoryCheckpointRepository;

/// Creates a CheckpointRepository for the configured backend.
///
/// The PostgreSQL backend connects eagerly and applies the checkpoint schema.
pub async fn create_checkpoint_repository(
    config: &CheckpointConfig,
) -> anyhow::Result<Arc<dyn CheckpointRepository>> {
    match config.backend {
        CheckpointBackend::Memory => Ok(Arc::new(InMemoryCheckpointRepository::new())),
        CheckpointBackend::Postgres => {
            let db = Database::from_checkpoint_config(config).await?;
            let repo = PostgresCheckpointRepository::new(db.pool().clone());
            repo.ensure_schema().await?;
            tracing::info!("Using PostgreSQL checkpoint repository");
            Ok(Arc::new(repo))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend() {
        let repo = create_checkpoint_repository(&CheckpointConfig::default()).await.unwrap();
        assert!(repo.find_by_flow(crate::domain::flow::FlowId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_postgres_backend_requires_url() {
        let config = CheckpointConfig {
            backend: CheckpointBackend::Postgres,
            database_url: None,
            ..Default::default()
        };
        assert!(create_checkpoint_repository(&config).await.is_err());
    }
}
