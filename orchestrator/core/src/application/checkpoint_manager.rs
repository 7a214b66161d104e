// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Checkpoint Manager
//!
//! Creates, restores and prunes flow checkpoints on top of a
//! [`CheckpointRepository`]. Only phases on the configured safe list are
//! checkpointed; every successful create is followed by a prune so a flow
//! never holds more than `retention` snapshots.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Checkpoint lifecycle (create / restore / latest / list / delete / purge)

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::checkpoint::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointMetadata, RestoredCheckpoint,
};
use crate::domain::config::CheckpointConfig;
use crate::domain::events::CheckpointEvent;
use crate::domain::flow::{Flow, FlowId};
use crate::domain::repository::{CheckpointRepository, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

pub struct CheckpointManager {
    repository: Arc<dyn CheckpointRepository>,
    config: CheckpointConfig,
    event_bus: EventBus,
}

impl CheckpointManager {
    pub fn new(
        repository: Arc<dyn CheckpointRepository>,
        config: CheckpointConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            config,
            event_bus,
        }
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    pub fn is_checkpointable(&self, phase: &str) -> bool {
        self.config.is_safe_phase(phase)
    }

    /// Snapshots `flow` for `phase` and prunes older checkpoints beyond the
    /// retention bound.
    pub async fn create_checkpoint(
        &self,
        flow: &Flow,
        phase: &str,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointId, CheckpointError> {
        if !self.is_checkpointable(phase) {
            return Err(CheckpointError::PhaseNotCheckpointable(phase.to_string()));
        }

        let (checkpoint, dropped) =
            Checkpoint::capture(flow, phase, metadata, self.config.max_field_bytes);
        self.repository.save(&checkpoint).await?;

        info!(
            flow_id = %flow.id,
            checkpoint_id = %checkpoint.id,
            phase,
            dropped_fields = dropped.len(),
            "Checkpoint created"
        );
        self.event_bus.publish_checkpoint_event(CheckpointEvent::CheckpointCreated {
            flow_id: flow.id,
            checkpoint_id: checkpoint.id,
            phase: phase.to_string(),
            dropped_fields: dropped.iter().map(|(f, _)| f.to_string()).collect(),
            created_at: checkpoint.created_at,
        });

        let removed = self.repository.prune(flow.id, self.config.retention).await?;
        if removed > 0 {
            debug!(flow_id = %flow.id, removed, "Pruned old checkpoints");
            self.event_bus.publish_checkpoint_event(CheckpointEvent::CheckpointsPruned {
                flow_id: flow.id,
                removed,
                pruned_at: Utc::now(),
            });
        }

        Ok(checkpoint.id)
    }

    pub async fn restore_checkpoint(
        &self,
        id: CheckpointId,
    ) -> Result<RestoredCheckpoint, CheckpointError> {
        let checkpoint = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(CheckpointError::NotFound(id))?;
        self.restore(&checkpoint)
    }

    /// Most recent checkpoint of a flow, optionally restricted to one phase.
    pub async fn get_latest_checkpoint(
        &self,
        flow_id: FlowId,
        phase: Option<&str>,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let checkpoints = self.repository.find_by_flow(flow_id).await?;
        Ok(checkpoints
            .into_iter()
            .rev()
            .find(|c| phase.map_or(true, |p| c.phase == p)))
    }

    /// All checkpoints of a flow, oldest first.
    pub async fn list_checkpoints(
        &self,
        flow_id: FlowId,
    ) -> Result<Vec<Checkpoint>, CheckpointError> {
        Ok(self.repository.find_by_flow(flow_id).await?)
    }

    pub async fn delete_checkpoint(&self, id: CheckpointId) -> Result<(), CheckpointError> {
        self.repository.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => CheckpointError::NotFound(id),
            other => other.into(),
        })
    }

    /// Removes every checkpoint of a flow. Returns how many were removed.
    pub async fn purge(&self, flow_id: FlowId) -> Result<usize, CheckpointError> {
        let removed = self.repository.delete_by_flow(flow_id).await?;
        info!(flow_id = %flow_id, removed, "Purged checkpoints");
        Ok(removed)
    }

    /// Rewinds `flow` to the newest checkpoint taken at `preferred_phase`,
    /// or to its newest checkpoint of any phase when there is none. Returns
    /// `None` when the flow has no checkpoint at all.
    pub async fn restore_latest_into(
        &self,
        flow: &mut Flow,
        preferred_phase: Option<&str>,
    ) -> Result<Option<RestoredCheckpoint>, CheckpointError> {
        let checkpoints = self.repository.find_by_flow(flow.id).await?;
        let preferred = preferred_phase
            .and_then(|phase| checkpoints.iter().rev().find(|c| c.phase == phase));
        let Some(checkpoint) = preferred.or_else(|| checkpoints.last()) else {
            return Ok(None);
        };
        let restored = self.restore(&checkpoint)?;
        restored.state.apply_to(flow);
        Ok(Some(restored))
    }

    fn restore(&self, checkpoint: &Checkpoint) -> Result<RestoredCheckpoint, CheckpointError> {
        let restored = checkpoint.restore()?;
        let unavailable: Vec<String> = restored
            .state
            .payload
            .unavailable_fields()
            .iter()
            .map(|f| f.to_string())
            .collect();

        info!(
            flow_id = %restored.flow_id,
            checkpoint_id = %restored.checkpoint_id,
            phase = %restored.phase,
            unavailable_fields = unavailable.len(),
            "Checkpoint restored"
        );
        self.event_bus.publish_checkpoint_event(CheckpointEvent::CheckpointRestored {
            flow_id: restored.flow_id,
            checkpoint_id: restored.checkpoint_id,
            unavailable_fields: unavailable,
            restored_at: Utc::now(),
        });
        Ok(restored)
    }
}
