// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Checkpoint
//!
//! PostgreSQL-backed checkpoint storage. The encoded field map and metadata
//! are stored as JSONB; retention is enforced with a single
//! `DELETE ... NOT IN (newest N)` statement.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `CheckpointRepository` over `sqlx::PgPool`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::BTreeMap;

use crate::domain::checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata, EncodedField};
use crate::domain::flow::{FlowId, FlowStatus, PayloadField};
use crate::domain::repository::{CheckpointRepository, RepositoryError};

const SCHEMA: &str = include_str!("../../../migrations/001_flow_checkpoints.sql");

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, flow_id, phase, format_version, status, current_phase,
        progress_percentage, fields, metadata, created_at
    FROM flow_checkpoints
"#;

pub struct PostgresCheckpointRepository {
    pool: PgPool,
}

impl PostgresCheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the table and index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                RepositoryError::Database(format!("Failed to create checkpoint schema: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointRepository for PostgresCheckpointRepository {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let status_json = serde_json::to_value(checkpoint.status)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let fields_json = serde_json::to_value(&checkpoint.fields)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let metadata_json = serde_json::Value::Object(checkpoint.metadata.clone());

        sqlx::query(
            r#"
            INSERT INTO flow_checkpoints (
                id, flow_id, phase, format_version, status, current_phase,
                progress_percentage, fields, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            -- checkpoints are immutable once written
            "#
        )
        .bind(checkpoint.id.0)
        .bind(checkpoint.flow_id.0)
        .bind(&checkpoint.phase)
        .bind(checkpoint.format_version as i32)
        .bind(status_json)
        .bind(&checkpoint.current_phase)
        .bind(checkpoint.progress_percentage)
        .bind(fields_json)
        .bind(metadata_json)
        .bind(checkpoint.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save checkpoint: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: CheckpointId) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_checkpoint_row).transpose()
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<Checkpoint>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE flow_id = $1 ORDER BY created_at ASC, seq ASC",
            SELECT_COLUMNS
        ))
        .bind(flow_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(parse_checkpoint_row).collect()
    }

    async fn delete(&self, id: CheckpointId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM flow_checkpoints WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Checkpoint {} not found", id)));
        }

        Ok(())
    }

    async fn delete_by_flow(&self, flow_id: FlowId) -> Result<usize, RepositoryError> {
        let result = sqlx::query("DELETE FROM flow_checkpoints WHERE flow_id = $1")
            .bind(flow_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }

    async fn prune(&self, flow_id: FlowId, keep: usize) -> Result<usize, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM flow_checkpoints
            WHERE flow_id = $1
              AND id NOT IN (
                  SELECT id FROM flow_checkpoints
                  WHERE flow_id = $1
                  ORDER BY created_at DESC, seq DESC
                  LIMIT $2
              )
            "#
        )
        .bind(flow_id.0)
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to prune checkpoints: {}", e)))?;

        Ok(result.rows_affected() as usize)
    }
}

/// Parse a checkpoint from a database row
fn parse_checkpoint_row(row: sqlx::postgres::PgRow) -> Result<Checkpoint, RepositoryError> {
    let id: uuid::Uuid = row.get("id");
    let flow_id: uuid::Uuid = row.get("flow_id");
    let phase: String = row.get("phase");
    let format_version: i32 = row.get("format_version");
    let status_val: serde_json::Value = row.get("status");
    let current_phase: String = row.get("current_phase");
    let progress_percentage: f64 = row.get("progress_percentage");
    let fields_val: serde_json::Value = row.get("fields");
    let metadata_val: serde_json::Value = row.get("metadata");
    let created_at: DateTime<Utc> = row.get("created_at");

    let status: FlowStatus = serde_json::from_value(status_val)
        .map_err(|e| {
            RepositoryError::Serialization(format!("Failed to deserialize status: {}", e))
        })?;

    let fields: BTreeMap<PayloadField, EncodedField> = serde_json::from_value(fields_val)
        .map_err(|e| {
            RepositoryError::Serialization(format!("Failed to deserialize fields: {}", e))
        })?;

    let metadata: CheckpointMetadata = match metadata_val {
        serde_json::Value::Object(map) => map,
        _ => CheckpointMetadata::new(),
    };

    Ok(Checkpoint {
        id: CheckpointId(id),
        flow_id: FlowId(flow_id),
        phase,
        format_version: format_version.max(0) as u32,
        status,
        current_phase,
        progress_percentage,
        fields,
        metadata,
        created_at,
    })
}
