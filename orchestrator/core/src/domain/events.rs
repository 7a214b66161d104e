// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::domain::checkpoint::CheckpointId;
use crate::domain::error_classification::ErrorCategory;
use crate::domain::flow::FlowId;
use crate::domain::health::HealthStatus;
use crate::domain::recovery::{RecoveryOutcome, RecoveryStrategy};
use crate::domain::tenant::TenantKey;

/// Health monitor detections and the actions taken on them.
///
/// Every Hanging/Critical/Failed detection and every auto-recovery decision
/// (applied or skipped) produces one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthEvent {
    FlowHealthDetected {
        flow_id: FlowId,
        phase: String,
        status: HealthStatus,
        phase_elapsed_secs: u64,
        total_elapsed_secs: u64,
        reason: Option<String>,
        detected_at: DateTime<Utc>,
    },
    AutoRecoveryApplied {
        flow_id: FlowId,
        phase: String,
        action: String, // "await_user_input", "complete_with_partial_result", "mark_failed"
        applied_at: DateTime<Utc>,
    },
    AutoRecoverySkipped {
        flow_id: FlowId,
        phase: String,
        reason: String,
        skipped_at: DateTime<Utc>,
    },
    ForcedRecoveryApplied {
        flow_id: FlowId,
        action: String, // "restart", "complete", "fail"
        checkpoint_id: Option<CheckpointId>,
        applied_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecoveryEvent {
    RecoveryStarted {
        flow_id: FlowId,
        phase: String,
        category: ErrorCategory,
        prior_attempts: u32,
        started_at: DateTime<Utc>,
    },
    StrategySelected {
        flow_id: FlowId,
        phase: String,
        strategy: RecoveryStrategy,
        selected_at: DateTime<Utc>,
    },
    RecoveryFinished {
        flow_id: FlowId,
        phase: String,
        outcome: RecoveryOutcome,
        attempts: u32,
        finished_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CheckpointEvent {
    CheckpointCreated {
        flow_id: FlowId,
        checkpoint_id: CheckpointId,
        phase: String,
        dropped_fields: Vec<String>,
        created_at: DateTime<Utc>,
    },
    CheckpointRestored {
        flow_id: FlowId,
        checkpoint_id: CheckpointId,
        unavailable_fields: Vec<String>,
        restored_at: DateTime<Utc>,
    },
    CheckpointsPruned {
        flow_id: FlowId,
        removed: usize,
        pruned_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolEvent {
    AgentCreated {
        tenant: TenantKey,
        capability: String,
        recreated: bool,
        created_at: DateTime<Utc>,
    },
    AgentCreationFailed {
        tenant: TenantKey,
        capability: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    TenantEvicted {
        tenant: TenantKey,
        idle_secs: u64,
        agent_count: usize,
        evicted_at: DateTime<Utc>,
    },
    TenantRemoved {
        tenant: TenantKey,
        removed_at: DateTime<Utc>,
    },
}

impl HealthEvent {
    pub fn flow_id(&self) -> FlowId {
        match self {
            HealthEvent::FlowHealthDetected { flow_id, .. }
            | HealthEvent::AutoRecoveryApplied { flow_id, .. }
            | HealthEvent::AutoRecoverySkipped { flow_id, .. }
            | HealthEvent::ForcedRecoveryApplied { flow_id, .. } => *flow_id,
        }
    }
}

impl RecoveryEvent {
    pub fn flow_id(&self) -> FlowId {
        match self {
            RecoveryEvent::RecoveryStarted { flow_id, .. }
            | RecoveryEvent::StrategySelected { flow_id, .. }
            | RecoveryEvent::RecoveryFinished { flow_id, .. } => *flow_id,
        }
    }
}

impl CheckpointEvent {
    pub fn flow_id(&self) -> FlowId {
        match self {
            CheckpointEvent::CheckpointCreated { flow_id, .. }
            | CheckpointEvent::CheckpointRestored { flow_id, .. }
            | CheckpointEvent::CheckpointsPruned { flow_id, .. } => *flow_id,
        }
    }
}
