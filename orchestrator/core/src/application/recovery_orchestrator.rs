// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Flow Error Recovery Orchestrator
//!
//! Decides what happens after a phase fails. The ladder below is evaluated
//! top to bottom; the first rung that produces a result wins:
//!
//! 1. `Permanent` error: fail fast.
//! 2. `Transient` error with fewer than 3 prior attempts: retry with the
//!    phase's backoff policy.
//! 3. `Resource` error with a checkpoint and fewer than 2 prior attempts:
//!    restore the latest checkpoint and retry once.
//! 4. Partial-result phases (`dependency_analysis`, `tech_debt_analysis`):
//!    return a degraded payload.
//! 5. Skippable phases (`field_mapping`) past the skip threshold: skip and
//!    flag for manual follow-up.
//! 6. Retry the attempts left under the phase ceiling, else fail.
//!
//! Rungs 2, 3 and 5 gate on the attempt count read when the failure arrived;
//! rung 6 uses the live count, so attempts spent on rungs 2/3 are not repeated.
//!
//! The attempt counter is keyed by (flow, phase), bumped on every phase
//! invocation made under recovery, and reset only when the phase succeeds
//! or the flow is discarded.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Failure handling for phase executors

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::checkpoint_manager::CheckpointManager;
use crate::application::retry_executor::{retry_with_backoff, RetryError};
use crate::domain::error_classification::{classify, ErrorCategory, PhaseError};
use crate::domain::events::RecoveryEvent;
use crate::domain::flow::{Flow, FlowId, FlowStatus, PARTIAL_RESULT_MARKER};
use crate::domain::recovery::{
    partial_result_for, RecoveryError, RecoveryMethod, RecoveryMetricsSummary, RecoveryPolicy,
    RecoveryResult, RecoveryStrategy,
};
use crate::domain::retry::{PhasePolicies, RetryPolicy};
use crate::infrastructure::event_bus::EventBus;

/// Re-runs a phase body. Implemented by the host's phase executor.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, flow: &Flow) -> Result<serde_json::Value, PhaseError>;
}

type AttemptKey = (FlowId, String);

pub struct FlowErrorRecoveryOrchestrator {
    checkpoints: Arc<CheckpointManager>,
    retry_policies: PhasePolicies,
    policy: RecoveryPolicy,
    event_bus: EventBus,
    attempts: Mutex<HashMap<AttemptKey, u32>>,
    in_flight: Mutex<HashSet<AttemptKey>>,
    summary: Mutex<RecoveryMetricsSummary>,
}

/// Marks a (flow, phase) as under recovery until dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<AttemptKey>>,
    key: AttemptKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<AttemptKey>>, key: AttemptKey) -> Option<Self> {
        if !in_flight.lock().insert(key.clone()) {
            return None;
        }
        Some(Self { in_flight, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

/// Result of one rung of the ladder.
enum Fallthrough {
    Continue,
    Done(RecoveryResult),
}

impl FlowErrorRecoveryOrchestrator {
    pub fn new(
        checkpoints: Arc<CheckpointManager>,
        retry_policies: PhasePolicies,
        policy: RecoveryPolicy,
        event_bus: EventBus,
    ) -> Self {
        Self {
            checkpoints,
            retry_policies,
            policy,
            event_bus,
            attempts: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            summary: Mutex::new(RecoveryMetricsSummary::default()),
        }
    }

    /// Handles one phase failure and returns the recovery outcome.
    ///
    /// At most one call per (flow, phase) may be in flight; a concurrent
    /// second call is rejected with [`RecoveryError::AlreadyInProgress`].
    pub async fn handle_phase_error(
        &self,
        phase: &str,
        error: PhaseError,
        flow: &mut Flow,
        executor: &dyn PhaseExecutor,
        cancel: &CancellationToken,
    ) -> Result<RecoveryResult, RecoveryError> {
        let key = (flow.id, phase.to_string());
        let _guard = InFlightGuard::acquire(&self.in_flight, key.clone()).ok_or_else(|| {
            RecoveryError::AlreadyInProgress {
                flow_id: flow.id,
                phase: phase.to_string(),
            }
        })?;

        let category = classify(&error);
        let prior = self.attempt_count(flow.id, phase);

        self.summary.lock().record_error(phase, category);
        flow.record_error(phase, Some(category), error.to_string());
        info!(
            flow_id = %flow.id,
            phase,
            category = %category,
            prior_attempts = prior,
            error = %error,
            "Handling phase error"
        );
        self.event_bus.publish_recovery_event(RecoveryEvent::RecoveryStarted {
            flow_id: flow.id,
            phase: phase.to_string(),
            category,
            prior_attempts: prior,
            started_at: Utc::now(),
        });

        let result = self
            .decide(phase, &error, category, prior, flow, executor, cancel)
            .await?;

        if result.is_recovered() {
            self.attempts.lock().remove(&key);
        }
        self.finish(flow.id, phase, &result);
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn decide(
        &self,
        phase: &str,
        error: &PhaseError,
        category: ErrorCategory,
        prior: u32,
        flow: &mut Flow,
        executor: &dyn PhaseExecutor,
        cancel: &CancellationToken,
    ) -> Result<RecoveryResult, RecoveryError> {
        if category == ErrorCategory::Permanent {
            self.select(flow.id, phase, RecoveryStrategy::FailFast);
            return Ok(self.failed(flow.id, phase, error, category));
        }

        let phase_policy = self.retry_policies.for_phase(phase).clone();
        let ceiling = phase_policy.max_attempts_for(category);

        // attempts made by earlier calls count against the phase ceiling
        let transient_budget = ceiling.saturating_sub(prior);
        if category == ErrorCategory::Transient
            && prior < self.policy.transient_attempt_gate
            && transient_budget > 0
        {
            self.select(flow.id, phase, RecoveryStrategy::Retry);
            let budgeted = policy_with_attempts(&phase_policy, category, transient_budget);
            if let Fallthrough::Done(result) = self
                .retry(phase, error, category, &budgeted, flow, executor, cancel)
                .await?
            {
                return Ok(result);
            }
        }

        if category == ErrorCategory::Resource
            && self.policy.prefer_checkpoint_for_resource
            && prior < self.policy.resource_attempt_gate
        {
            if let Fallthrough::Done(result) = self
                .restore_and_retry(phase, error, category, flow, executor)
                .await
            {
                return Ok(result);
            }
        }

        if let Some((result, completeness)) = partial_result_for(phase) {
            self.select(flow.id, phase, RecoveryStrategy::PartialResult);
            flow.set_marker(PARTIAL_RESULT_MARKER, serde_json::Value::Bool(true));
            return Ok(RecoveryResult::Partial { result, completeness });
        }

        if self.policy.is_skippable(phase) && prior > self.policy.skip_after_attempts {
            self.select(flow.id, phase, RecoveryStrategy::SkipPhase);
            return Ok(RecoveryResult::Skipped {
                reason: format!(
                    "phase '{}' failed after {} recovery attempts: {}",
                    phase, prior, error
                ),
                requires_manual_intervention: true,
            });
        }

        let used = self.attempt_count(flow.id, phase);
        if used < ceiling {
            self.select(flow.id, phase, RecoveryStrategy::Retry);
            let remaining = policy_with_attempts(&phase_policy, category, ceiling - used);
            if let Fallthrough::Done(result) = self
                .retry(phase, error, category, &remaining, flow, executor, cancel)
                .await?
            {
                return Ok(result);
            }
        }

        self.select(flow.id, phase, RecoveryStrategy::FailFast);
        Ok(self.failed(flow.id, phase, error, category))
    }

    #[allow(clippy::too_many_arguments)]
    async fn retry(
        &self,
        phase: &str,
        original: &PhaseError,
        category: ErrorCategory,
        policy: &RetryPolicy,
        flow: &Flow,
        executor: &dyn PhaseExecutor,
        cancel: &CancellationToken,
    ) -> Result<Fallthrough, RecoveryError> {
        let key = (flow.id, phase.to_string());
        let outcome = retry_with_backoff(
            || {
                self.bump(&key);
                executor.execute(flow)
            },
            policy,
            cancel,
        )
        .await;

        match outcome {
            Ok(result) => Ok(Fallthrough::Done(RecoveryResult::Recovered {
                result,
                method: RecoveryMethod::Retry,
                attempts: self.attempt_count(flow.id, phase),
            })),
            Err(RetryError::Aborted { error, .. }) => {
                warn!(
                    flow_id = %flow.id,
                    phase,
                    error = %error,
                    "Permanent error during recovery retry"
                );
                Ok(Fallthrough::Done(self.failed(flow.id, phase, original, category)))
            }
            Err(RetryError::Exhausted { attempts, .. }) => {
                warn!(flow_id = %flow.id, phase, attempts, "Recovery retries exhausted");
                Ok(Fallthrough::Continue)
            }
            Err(RetryError::Cancelled { .. }) => Err(RecoveryError::Cancelled {
                flow_id: flow.id,
                phase: phase.to_string(),
                attempts: self.attempt_count(flow.id, phase),
            }),
        }
    }

    async fn restore_and_retry(
        &self,
        phase: &str,
        original: &PhaseError,
        category: ErrorCategory,
        flow: &mut Flow,
        executor: &dyn PhaseExecutor,
    ) -> Fallthrough {
        let restored = match self.checkpoints.restore_latest_into(flow, Some(phase)).await {
            Ok(Some(restored)) => restored,
            Ok(None) => return Fallthrough::Continue,
            Err(e) => {
                warn!(
                    flow_id = %flow.id,
                    phase,
                    error = %e,
                    "Checkpoint unavailable for resource recovery"
                );
                return Fallthrough::Continue;
            }
        };

        self.select(flow.id, phase, RecoveryStrategy::CheckpointRestore);
        flow.set_status(FlowStatus::Running);
        info!(
            flow_id = %flow.id,
            phase,
            checkpoint_id = %restored.checkpoint_id,
            "Restored checkpoint, retrying phase once"
        );

        self.bump(&(flow.id, phase.to_string()));
        match executor.execute(flow).await {
            Ok(result) => Fallthrough::Done(RecoveryResult::Recovered {
                result,
                method: RecoveryMethod::CheckpointRestore,
                attempts: self.attempt_count(flow.id, phase),
            }),
            Err(retry_error) if classify(&retry_error) == ErrorCategory::Permanent => {
                warn!(
                    flow_id = %flow.id,
                    phase,
                    error = %retry_error,
                    "Permanent error after checkpoint restore"
                );
                Fallthrough::Done(self.failed(flow.id, phase, original, category))
            }
            Err(retry_error) => {
                warn!(
                    flow_id = %flow.id,
                    phase,
                    error = %retry_error,
                    "Retry after checkpoint restore failed"
                );
                Fallthrough::Continue
            }
        }
    }

    fn failed(
        &self,
        flow_id: FlowId,
        phase: &str,
        error: &PhaseError,
        category: ErrorCategory,
    ) -> RecoveryResult {
        RecoveryResult::Failed {
            error: error.clone(),
            category,
            attempts: self.attempt_count(flow_id, phase),
        }
    }

    fn select(&self, flow_id: FlowId, phase: &str, strategy: RecoveryStrategy) {
        info!(
            flow_id = %flow_id,
            phase,
            strategy = strategy.as_str(),
            "Recovery strategy selected"
        );
        self.event_bus.publish_recovery_event(RecoveryEvent::StrategySelected {
            flow_id,
            phase: phase.to_string(),
            strategy,
            selected_at: Utc::now(),
        });
    }

    fn finish(&self, flow_id: FlowId, phase: &str, result: &RecoveryResult) {
        let outcome = result.outcome();
        let attempts = match result {
            RecoveryResult::Recovered { attempts, .. }
            | RecoveryResult::Failed { attempts, .. } => *attempts,
            _ => self.attempt_count(flow_id, phase),
        };

        self.summary.lock().record_outcome(outcome);
        metrics::counter!(
            "flowguard_recovery_outcomes_total",
            "phase" => phase.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        info!(flow_id = %flow_id, phase, outcome = %outcome, attempts, "Phase recovery finished");
        self.event_bus.publish_recovery_event(RecoveryEvent::RecoveryFinished {
            flow_id,
            phase: phase.to_string(),
            outcome,
            attempts,
            finished_at: Utc::now(),
        });
    }

    fn bump(&self, key: &AttemptKey) {
        *self.attempts.lock().entry(key.clone()).or_insert(0) += 1;
    }

    /// Recovery attempts recorded for (flow, phase) since it last succeeded.
    pub fn attempt_count(&self, flow_id: FlowId, phase: &str) -> u32 {
        self.attempts
            .lock()
            .get(&(flow_id, phase.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Resets the counter after the host ran the phase successfully.
    pub fn mark_phase_succeeded(&self, flow_id: FlowId, phase: &str) {
        self.attempts.lock().remove(&(flow_id, phase.to_string()));
    }

    /// Drops every counter of a discarded flow.
    pub fn discard_flow(&self, flow_id: FlowId) {
        self.attempts.lock().retain(|(id, _), _| *id != flow_id);
    }

    pub fn metrics_summary(&self) -> RecoveryMetricsSummary {
        self.summary.lock().clone()
    }
}

/// `base` adjusted so that `category` gets exactly `attempts` invocations.
fn policy_with_attempts(base: &RetryPolicy, category: ErrorCategory, attempts: u32) -> RetryPolicy {
    let max_retries = match category {
        // Unknown runs one below max_retries
        ErrorCategory::Unknown => attempts + 1,
        _ => attempts,
    };
    base.clone().with_max_retries(max_retries)
}
