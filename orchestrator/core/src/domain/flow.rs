// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Flow Domain Model
//!
//! A **flow** is one multi-phase job instance (a discovery, assessment or
//! decommission run). The resilience core reads and mutates only the status,
//! current phase, error log and runtime record of a flow; the payload is owned
//! by the calling service and is touched only by checkpoint capture/restore.
//!
//! # Architectural Context
//!
//! - **Bounded Context:** Flow Execution Context
//! - **Aggregate Root:** Flow
//!
//! # Phase Sequences
//!
//! - **Discovery:** initialization → data_import → field_mapping → data_cleansing →
//!   asset_inventory → dependency_analysis → tech_debt_analysis
//! - **Assessment:** initialization → architecture_standards → tech_debt_analysis →
//!   component_sixr_strategies → app_on_page_generation → finalization
//! - **Decommission:** initialization → decommission_planning → data_migration →
//!   system_shutdown

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::domain::error_classification::ErrorCategory;
use crate::domain::tenant::TenantKey;

/// Well-known phase names shared across flow types.
pub mod phases {
    pub const INITIALIZATION: &str = "initialization";
    pub const DATA_IMPORT: &str = "data_import";
    pub const FIELD_MAPPING: &str = "field_mapping";
    pub const DATA_CLEANSING: &str = "data_cleansing";
    pub const ASSET_INVENTORY: &str = "asset_inventory";
    pub const DEPENDENCY_ANALYSIS: &str = "dependency_analysis";
    pub const TECH_DEBT_ANALYSIS: &str = "tech_debt_analysis";
    pub const ARCHITECTURE_STANDARDS: &str = "architecture_standards";
    pub const COMPONENT_SIXR_STRATEGIES: &str = "component_sixr_strategies";
    pub const APP_ON_PAGE_GENERATION: &str = "app_on_page_generation";
    pub const FINALIZATION: &str = "finalization";
    pub const DECOMMISSION_PLANNING: &str = "decommission_planning";
    pub const DATA_MIGRATION: &str = "data_migration";
    pub const SYSTEM_SHUTDOWN: &str = "system_shutdown";
}

/// Runtime-record key set when a phase was completed with degraded output.
pub const PARTIAL_RESULT_MARKER: &str = "partial_result";

/// Runtime-record key set when a flow was parked waiting for a user.
pub const AWAITING_USER_INPUT_MARKER: &str = "awaiting_user_input";

/// Unique identifier for a [`Flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    Discovery,
    Assessment,
    Decommission,
}

impl FlowType {
    /// Ordered phase sequence for this flow type.
    pub fn phases(&self) -> &'static [&'static str] {
        use phases::*;
        match self {
            FlowType::Discovery => &[
                INITIALIZATION,
                DATA_IMPORT,
                FIELD_MAPPING,
                DATA_CLEANSING,
                ASSET_INVENTORY,
                DEPENDENCY_ANALYSIS,
                TECH_DEBT_ANALYSIS,
            ],
            FlowType::Assessment => &[
                INITIALIZATION,
                ARCHITECTURE_STANDARDS,
                TECH_DEBT_ANALYSIS,
                COMPONENT_SIXR_STRATEGIES,
                APP_ON_PAGE_GENERATION,
                FINALIZATION,
            ],
            FlowType::Decommission => &[
                INITIALIZATION,
                DECOMMISSION_PLANNING,
                DATA_MIGRATION,
                SYSTEM_SHUTDOWN,
            ],
        }
    }

    pub fn first_phase(&self) -> &'static str {
        self.phases()[0]
    }

    /// Phase following `phase`, or `None` if `phase` is last or unknown.
    pub fn next_phase(&self, phase: &str) -> Option<&'static str> {
        let phases = self.phases();
        let idx = phases.iter().position(|p| *p == phase)?;
        phases.get(idx + 1).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Discovery => "discovery",
            FlowType::Assessment => "assessment",
            FlowType::Decommission => "decommission",
        }
    }
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Initialized,
    Running,
    WaitingForUserInput,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl FlowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStatus::Completed | FlowStatus::Failed | FlowStatus::Cancelled)
    }

    /// Flows the health monitor keeps an eye on.
    pub fn is_active(&self) -> bool {
        !matches!(self, FlowStatus::Completed | FlowStatus::Cancelled)
    }

    /// Held on purpose by a user or the host; automatic recovery leaves it alone.
    pub fn is_on_hold(&self) -> bool {
        matches!(self, FlowStatus::WaitingForUserInput | FlowStatus::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Initialized => "initialized",
            FlowStatus::Running => "running",
            FlowStatus::WaitingForUserInput => "waiting_for_user_input",
            FlowStatus::Paused => "paused",
            FlowStatus::Completed => "completed",
            FlowStatus::Failed => "failed",
            FlowStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a flow's accumulated error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowErrorEntry {
    pub phase: String,
    pub category: Option<ErrorCategory>,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Domain payload captured by checkpoints.
///
/// The field set is fixed; checkpoint encoding walks [`PayloadField::ALL`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowPayload {
    #[serde(default)]
    pub raw_data: Vec<serde_json::Value>,
    #[serde(default)]
    pub field_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub cleaned_data: Vec<serde_json::Value>,
    #[serde(default)]
    pub asset_inventory: Vec<serde_json::Value>,
    #[serde(default)]
    pub dependencies: Option<serde_json::Value>,
    #[serde(default)]
    pub tech_debt_analysis: Option<serde_json::Value>,
}

/// Names of the payload fields on the checkpoint allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadField {
    RawData,
    FieldMappings,
    CleanedData,
    AssetInventory,
    Dependencies,
    TechDebtAnalysis,
}

impl PayloadField {
    pub const ALL: [PayloadField; 6] = [
        PayloadField::RawData,
        PayloadField::FieldMappings,
        PayloadField::CleanedData,
        PayloadField::AssetInventory,
        PayloadField::Dependencies,
        PayloadField::TechDebtAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadField::RawData => "raw_data",
            PayloadField::FieldMappings => "field_mappings",
            PayloadField::CleanedData => "cleaned_data",
            PayloadField::AssetInventory => "asset_inventory",
            PayloadField::Dependencies => "dependencies",
            PayloadField::TechDebtAnalysis => "tech_debt_analysis",
        }
    }
}

impl std::fmt::Display for PayloadField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root for one multi-phase flow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub flow_type: FlowType,
    pub tenant: TenantKey,
    pub current_phase: String,
    pub status: FlowStatus,
    pub progress_percentage: f64,
    pub phase_completion: HashMap<String, bool>,
    pub errors: Vec<FlowErrorEntry>,
    /// Free-form runtime markers (`partial_result`, `awaiting_user_input`, ...).
    pub runtime_state: serde_json::Map<String, serde_json::Value>,
    pub payload: FlowPayload,
    pub phase_started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    pub fn new(flow_type: FlowType, tenant: TenantKey) -> Self {
        let now = Utc::now();
        Self {
            id: FlowId::new(),
            flow_type,
            tenant,
            current_phase: flow_type.first_phase().to_string(),
            status: FlowStatus::Initialized,
            progress_percentage: 0.0,
            phase_completion: flow_type
                .phases()
                .iter()
                .map(|p| (p.to_string(), false))
                .collect(),
            errors: Vec::new(),
            runtime_state: serde_json::Map::new(),
            payload: FlowPayload::default(),
            phase_started_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn start(&mut self) {
        self.set_status(FlowStatus::Running);
    }

    /// Sets the status and bumps `updated_at`. Returns `false` when the status
    /// was already `status`, so repeated writes are harmless.
    pub fn set_status(&mut self, status: FlowStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Moves into `phase` (which must belong to this flow type).
    pub fn enter_phase(&mut self, phase: &str) -> bool {
        if !self.flow_type.phases().contains(&phase) {
            return false;
        }
        let now = Utc::now();
        self.current_phase = phase.to_string();
        self.phase_started_at = now;
        self.updated_at = now;
        true
    }

    /// Marks the current phase complete and moves to the next one.
    ///
    /// Returns the new phase, or `None` when the flow just finished its last
    /// phase (the flow is then `Completed`).
    pub fn advance_phase(&mut self) -> Option<&'static str> {
        self.phase_completion.insert(self.current_phase.clone(), true);
        self.progress_percentage = self.completion_percentage();
        match self.flow_type.next_phase(&self.current_phase) {
            Some(next) => {
                self.enter_phase(next);
                Some(next)
            }
            None => {
                self.progress_percentage = 100.0;
                self.set_status(FlowStatus::Completed);
                None
            }
        }
    }

    pub fn completion_percentage(&self) -> f64 {
        let phases = self.flow_type.phases();
        let done = phases
            .iter()
            .filter(|p| self.phase_completion.get(**p).copied().unwrap_or(false))
            .count();
        (done as f64 / phases.len() as f64) * 100.0
    }

    pub fn record_error(
        &mut self,
        phase: &str,
        category: Option<ErrorCategory>,
        message: impl Into<String>,
    ) {
        self.errors.push(FlowErrorEntry {
            phase: phase.to_string(),
            category,
            message: message.into(),
            recorded_at: Utc::now(),
        });
        self.touch();
    }

    pub fn set_marker(&mut self, key: &str, value: serde_json::Value) {
        self.runtime_state.insert(key.to_string(), value);
    }

    pub fn has_marker(&self, key: &str) -> bool {
        self.runtime_state
            .get(key)
            .map(|v| !v.is_null() && v != &serde_json::Value::Bool(false))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantKey {
        TenantKey::new("client-1", "engagement-1")
    }

    #[test]
    fn test_new_flow_starts_at_first_phase() {
        let flow = Flow::new(FlowType::Discovery, tenant());
        assert_eq!(flow.current_phase, phases::INITIALIZATION);
        assert_eq!(flow.status, FlowStatus::Initialized);
        assert_eq!(flow.phase_completion.len(), 7);
        assert!(flow.phase_completion.values().all(|done| !done));
    }

    #[test]
    fn test_advance_phase_updates_progress() {
        let mut flow = Flow::new(FlowType::Decommission, tenant());
        flow.start();

        assert_eq!(flow.advance_phase(), Some(phases::DECOMMISSION_PLANNING));
        assert_eq!(flow.progress_percentage, 25.0);
        assert_eq!(flow.advance_phase(), Some(phases::DATA_MIGRATION));
        assert_eq!(flow.advance_phase(), Some(phases::SYSTEM_SHUTDOWN));
        assert_eq!(flow.advance_phase(), None);
        assert_eq!(flow.status, FlowStatus::Completed);
        assert_eq!(flow.progress_percentage, 100.0);
    }

    #[test]
    fn test_set_status_is_idempotent() {
        let mut flow = Flow::new(FlowType::Assessment, tenant());
        assert!(flow.set_status(FlowStatus::Running));
        assert!(!flow.set_status(FlowStatus::Running));
    }

    #[test]
    fn test_enter_phase_rejects_foreign_phase() {
        let mut flow = Flow::new(FlowType::Assessment, tenant());
        assert!(!flow.enter_phase(phases::FIELD_MAPPING));
        assert!(flow.enter_phase(phases::TECH_DEBT_ANALYSIS));
        assert_eq!(flow.current_phase, phases::TECH_DEBT_ANALYSIS);
    }

    #[test]
    fn test_status_predicates() {
        assert!(FlowStatus::Failed.is_terminal());
        assert!(FlowStatus::Failed.is_active());
        assert!(!FlowStatus::Completed.is_active());
        assert!(FlowStatus::WaitingForUserInput.is_active());
        assert!(!FlowStatus::WaitingForUserInput.is_terminal());
    }

    #[test]
    fn test_markers() {
        let mut flow = Flow::new(FlowType::Discovery, tenant());
        assert!(!flow.has_marker(PARTIAL_RESULT_MARKER));
        flow.set_marker(PARTIAL_RESULT_MARKER, serde_json::json!(true));
        assert!(flow.has_marker(PARTIAL_RESULT_MARKER));
        flow.set_marker(PARTIAL_RESULT_MARKER, serde_json::json!(false));
        assert!(!flow.has_marker(PARTIAL_RESULT_MARKER));
    }
}
