// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Recovery Results & Policy
//!
//! Types shared by the recovery orchestrator and its callers. A phase that
//! fails ends in exactly one [`RecoveryResult`]; callers must branch on the
//! variant rather than treat every non-success as fatal:
//!
//! - `Recovered`: the phase eventually produced a result.
//! - `Skipped`: the phase was abandoned and needs manual follow-up.
//! - `Partial`: degraded but usable output.
//! - `Failed`: terminal; carries the original error.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::domain::error_classification::{ErrorCategory, PhaseError};
use crate::domain::flow::{phases, FlowId};

/// How a recovered phase got its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    Retry,
    CheckpointRestore,
}

impl RecoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMethod::Retry => "retry",
            RecoveryMethod::CheckpointRestore => "checkpoint_restore",
        }
    }
}

/// Strategy the orchestrator chose for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Retry,
    CheckpointRestore,
    SkipPhase,
    PartialResult,
    FailFast,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::CheckpointRestore => "checkpoint_restore",
            RecoveryStrategy::SkipPhase => "skip_phase",
            RecoveryStrategy::PartialResult => "partial_result",
            RecoveryStrategy::FailFast => "fail_fast",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryResult {
    Recovered {
        result: serde_json::Value,
        method: RecoveryMethod,
        /// Phase invocations made under recovery for this (flow, phase).
        attempts: u32,
    },
    Skipped {
        reason: String,
        requires_manual_intervention: bool,
    },
    Partial {
        result: serde_json::Value,
        /// Fraction of the full result, in `[0, 1]`.
        completeness: f64,
    },
    Failed {
        error: PhaseError,
        category: ErrorCategory,
        attempts: u32,
    },
}

impl RecoveryResult {
    pub fn outcome(&self) -> RecoveryOutcome {
        match self {
            RecoveryResult::Recovered { .. } => RecoveryOutcome::Recovered,
            RecoveryResult::Skipped { .. } => RecoveryOutcome::Skipped,
            RecoveryResult::Partial { .. } => RecoveryOutcome::Partial,
            RecoveryResult::Failed { .. } => RecoveryOutcome::Failed,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, RecoveryResult::Recovered { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Recovered,
    Skipped,
    Partial,
    Failed,
}

impl RecoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOutcome::Recovered => "recovered",
            RecoveryOutcome::Skipped => "skipped",
            RecoveryOutcome::Partial => "partial",
            RecoveryOutcome::Failed => "failed",
        }
    }

    /// Outcomes that left the flow with usable output.
    pub fn is_success(&self) -> bool {
        matches!(self, RecoveryOutcome::Recovered | RecoveryOutcome::Partial)
    }
}

impl std::fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gates for the orchestrator's decision ladder (`spec.recovery`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Transient errors are retried while the attempt count is below this.
    #[serde(default = "default_transient_attempt_gate")]
    pub transient_attempt_gate: u32,

    /// Resource errors try a checkpoint restore while the count is below this.
    #[serde(default = "default_resource_attempt_gate")]
    pub resource_attempt_gate: u32,

    /// Restore-then-retry before blind retry for resource errors.
    #[serde(default = "default_prefer_checkpoint")]
    pub prefer_checkpoint_for_resource: bool,

    /// Skippable phases are skipped once the attempt count exceeds this.
    #[serde(default = "default_skip_after_attempts")]
    pub skip_after_attempts: u32,

    #[serde(default = "default_skippable_phases")]
    pub skippable_phases: Vec<String>,
}

fn default_transient_attempt_gate() -> u32 {
    3
}

fn default_resource_attempt_gate() -> u32 {
    2
}

fn default_prefer_checkpoint() -> bool {
    true
}

fn default_skip_after_attempts() -> u32 {
    2
}

fn default_skippable_phases() -> Vec<String> {
    vec![phases::FIELD_MAPPING.to_string()]
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            transient_attempt_gate: default_transient_attempt_gate(),
            resource_attempt_gate: default_resource_attempt_gate(),
            prefer_checkpoint_for_resource: default_prefer_checkpoint(),
            skip_after_attempts: default_skip_after_attempts(),
            skippable_phases: default_skippable_phases(),
        }
    }
}

impl RecoveryPolicy {
    pub fn is_skippable(&self, phase: &str) -> bool {
        self.skippable_phases.iter().any(|p| p == phase)
    }
}

/// Degraded payload for phases that can finish without full output.
pub fn partial_result_for(phase: &str) -> Option<(serde_json::Value, f64)> {
    match phase {
        phases::DEPENDENCY_ANALYSIS => Some((
            json!({
                "dependencies": [],
                "dependency_graph": { "nodes": [], "edges": [] },
                "partial": true,
            }),
            0.3,
        )),
        phases::TECH_DEBT_ANALYSIS => Some((
            json!({
                "tech_debt_items": [],
                "partial": true,
            }),
            0.5,
        )),
        _ => None,
    }
}

/// Aggregate view over every failure the orchestrator handled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetricsSummary {
    pub total_errors: u64,
    pub errors_by_phase: BTreeMap<String, u64>,
    pub errors_by_category: BTreeMap<String, u64>,
    pub outcomes: BTreeMap<RecoveryOutcome, u64>,
    /// Share of handled failures that ended `Recovered` or `Partial`.
    pub success_rate: f64,
}

impl RecoveryMetricsSummary {
    pub fn record_error(&mut self, phase: &str, category: ErrorCategory) {
        self.total_errors += 1;
        *self.errors_by_phase.entry(phase.to_string()).or_default() += 1;
        *self
            .errors_by_category
            .entry(category.as_str().to_string())
            .or_default() += 1;
    }

    pub fn record_outcome(&mut self, outcome: RecoveryOutcome) {
        *self.outcomes.entry(outcome).or_default() += 1;
        let handled: u64 = self.outcomes.values().sum();
        let succeeded: u64 = self
            .outcomes
            .iter()
            .filter(|(o, _)| o.is_success())
            .map(|(_, n)| n)
            .sum();
        self.success_rate = if handled == 0 {
            0.0
        } else {
            succeeded as f64 / handled as f64
        };
    }

    pub fn outcome_count(&self, outcome: RecoveryOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Recovery already in progress for flow {flow_id} phase '{phase}'")]
    AlreadyInProgress { flow_id: FlowId, phase: String },

    #[error("Recovery cancelled for flow {flow_id} phase '{phase}' after {attempts} attempt(s)")]
    Cancelled { flow_id: FlowId, phase: String, attempts: u32 },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] crate::domain::checkpoint::CheckpointError),

    #[error("Repository error: {0}")]
    Repository(#[from] crate::domain::repository::RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_payloads() {
        let (deps, completeness) = partial_result_for(phases::DEPENDENCY_ANALYSIS).unwrap();
        assert_eq!(deps["partial"], json!(true));
        assert_eq!(deps["dependency_graph"]["edges"], json!([]));
        assert!((completeness - 0.3).abs() < f64::EPSILON);

        let (debt, completeness) = partial_result_for(phases::TECH_DEBT_ANALYSIS).unwrap();
        assert_eq!(debt["tech_debt_items"], json!([]));
        assert!((completeness - 0.5).abs() < f64::EPSILON);

        assert!(partial_result_for(phases::FIELD_MAPPING).is_none());
    }

    #[test]
    fn test_summary_success_rate() {
        let mut summary = RecoveryMetricsSummary::default();
        summary.record_error(phases::DATA_IMPORT, ErrorCategory::Transient);
        summary.record_error(phases::DATA_IMPORT, ErrorCategory::Permanent);
        summary.record_error(phases::DEPENDENCY_ANALYSIS, ErrorCategory::Resource);
        summary.record_error(phases::FIELD_MAPPING, ErrorCategory::Transient);
        summary.record_outcome(RecoveryOutcome::Recovered);
        summary.record_outcome(RecoveryOutcome::Failed);
        summary.record_outcome(RecoveryOutcome::Partial);
        summary.record_outcome(RecoveryOutcome::Skipped);

        assert_eq!(summary.total_errors, 4);
        assert_eq!(summary.errors_by_phase[phases::DATA_IMPORT], 2);
        assert_eq!(summary.errors_by_category["transient"], 2);
        assert_eq!(summary.outcome_count(RecoveryOutcome::Failed), 1);
        assert!((summary.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RecoveryPolicy::default();
        assert!(policy.is_skippable(phases::FIELD_MAPPING));
        assert!(!policy.is_skippable(phases::DATA_IMPORT));
        assert!(policy.prefer_checkpoint_for_resource);
    }
}
