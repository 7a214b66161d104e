// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Flow Health Assessment
//!
//! Pure health classification for a single flow. The background scanner in
//! `application::health_monitor` calls [`assess_health`] on every active flow
//! and acts on the result; nothing here touches storage.
//!
//! ## State Machine
//!
//! ```text
//! Healthy ──► Warning ──► Critical
//!    │           │           │
//!    └───────────┴─► Hanging ┘      (any of these may return to Healthy)
//!
//! any ──► Failed                     (terminal, never left)
//! ```
//!
//! Checks run in order and the first match wins: declared failure, phase
//! timeout, long total duration, then short total duration or stagnation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::domain::flow::{phases, Flow, FlowId, FlowStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Hanging,
    Failed,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Hanging => "hanging",
            HealthStatus::Failed => "failed",
        }
    }

    /// Detections that must leave an auditable record.
    pub fn is_alerting(&self) -> bool {
        matches!(self, HealthStatus::Critical | HealthStatus::Hanging | HealthStatus::Failed)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health monitor configuration (`spec.health` in the config manifest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_scan_interval", with = "humantime_serde")]
    pub scan_interval: Duration,

    /// Total runtime after which a flow is `Warning`.
    #[serde(default = "default_warning_threshold", with = "humantime_serde")]
    pub warning_threshold: Duration,

    /// Total runtime after which a flow is `Critical`.
    #[serde(default = "default_critical_threshold", with = "humantime_serde")]
    pub critical_threshold: Duration,

    /// Runtime after which low progress counts as stagnation.
    #[serde(default = "default_stagnation_grace", with = "humantime_serde")]
    pub stagnation_grace: Duration,

    /// Progress percentage below which a flow past the grace period is stagnant.
    #[serde(default = "default_stagnation_progress_floor")]
    pub stagnation_progress_floor: f64,

    /// Minimum spacing between two auto-recoveries of the same flow.
    #[serde(default = "default_recovery_cooldown", with = "humantime_serde")]
    pub recovery_cooldown: Duration,

    #[serde(default = "default_phase_timeout", with = "humantime_serde")]
    pub default_phase_timeout: Duration,

    #[serde(default = "default_phase_timeouts", with = "phase_timeouts_serde")]
    pub phase_timeouts: HashMap<String, Duration>,
}

fn default_true() -> bool {
    true
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_warning_threshold() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_critical_threshold() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_stagnation_grace() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_stagnation_progress_floor() -> f64 {
    10.0
}

fn default_recovery_cooldown() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_phase_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_phase_timeouts() -> HashMap<String, Duration> {
    let mins = |m: u64| Duration::from_secs(m * 60);
    HashMap::from([
        (phases::INITIALIZATION.to_string(), mins(5)),
        (phases::DATA_IMPORT.to_string(), mins(15)),
        (phases::FIELD_MAPPING.to_string(), mins(20)),
        (phases::DATA_CLEANSING.to_string(), mins(20)),
        (phases::ASSET_INVENTORY.to_string(), mins(30)),
        (phases::DEPENDENCY_ANALYSIS.to_string(), mins(30)),
        (phases::TECH_DEBT_ANALYSIS.to_string(), mins(30)),
    ])
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            scan_interval: default_scan_interval(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            stagnation_grace: default_stagnation_grace(),
            stagnation_progress_floor: default_stagnation_progress_floor(),
            recovery_cooldown: default_recovery_cooldown(),
            default_phase_timeout: default_phase_timeout(),
            phase_timeouts: default_phase_timeouts(),
        }
    }
}

impl HealthMonitorConfig {
    pub fn timeout_for(&self, phase: &str) -> Duration {
        self.phase_timeouts
            .get(phase)
            .copied()
            .unwrap_or(self.default_phase_timeout)
    }
}

mod phase_timeouts_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        map: &HashMap<String, Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let sorted: BTreeMap<&str, humantime_serde::Serde<Duration>> = map
            .iter()
            .map(|(k, v)| (k.as_str(), humantime_serde::Serde::from(*v)))
            .collect();
        sorted.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<HashMap<String, Duration>, D::Error> {
        let raw = HashMap::<String, humantime_serde::Serde<Duration>>::deserialize(d)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.into_inner())).collect())
    }
}

/// Result of one health evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthAssessment {
    pub status: HealthStatus,
    pub phase_elapsed: Duration,
    pub total_elapsed: Duration,
    pub reason: Option<String>,
}

fn elapsed_since(from: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - from).to_std().unwrap_or(Duration::ZERO)
}

/// Classifies `flow` at instant `now`.
///
/// Phase time is measured from the last status update, so a flow that keeps
/// reporting progress inside one phase is never considered hanging.
pub fn assess_health(
    flow: &Flow,
    now: DateTime<Utc>,
    config: &HealthMonitorConfig,
) -> HealthAssessment {
    let phase_elapsed = elapsed_since(flow.updated_at, now);
    let total_elapsed = elapsed_since(flow.created_at, now);
    let assessment = |status, reason: Option<String>| HealthAssessment {
        status,
        phase_elapsed,
        total_elapsed,
        reason,
    };

    if flow.status == FlowStatus::Failed {
        return assessment(HealthStatus::Failed, Some("flow reported failure".to_string()));
    }

    let timeout = config.timeout_for(&flow.current_phase);
    if phase_elapsed > timeout {
        return assessment(
            HealthStatus::Hanging,
            Some(format!(
                "phase '{}' idle for {}s (timeout {}s)",
                flow.current_phase,
                phase_elapsed.as_secs(),
                timeout.as_secs()
            )),
        );
    }

    if total_elapsed > config.critical_threshold {
        return assessment(
            HealthStatus::Critical,
            Some(format!("running for {}s", total_elapsed.as_secs())),
        );
    }

    if total_elapsed > config.warning_threshold {
        return assessment(
            HealthStatus::Warning,
            Some(format!("running for {}s", total_elapsed.as_secs())),
        );
    }

    if total_elapsed > config.stagnation_grace
        && flow.progress_percentage < config.stagnation_progress_floor
    {
        return assessment(
            HealthStatus::Warning,
            Some(format!("stagnant at {:.1}% progress", flow.progress_percentage)),
        );
    }

    assessment(HealthStatus::Healthy, None)
}

/// What the monitor does to a hanging flow, chosen by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HangingRecoveryAction {
    /// Park the flow until a user resolves the mapping.
    AwaitUserInput,
    /// Finish the flow with whatever the phase produced so far.
    CompleteWithPartialResult,
    MarkFailed,
}

impl HangingRecoveryAction {
    pub fn for_phase(phase: &str) -> Self {
        match phase {
            phases::FIELD_MAPPING => HangingRecoveryAction::AwaitUserInput,
            phases::DEPENDENCY_ANALYSIS | phases::TECH_DEBT_ANALYSIS => {
                HangingRecoveryAction::CompleteWithPartialResult
            }
            _ => HangingRecoveryAction::MarkFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HangingRecoveryAction::AwaitUserInput => "await_user_input",
            HangingRecoveryAction::CompleteWithPartialResult => "complete_with_partial_result",
            HangingRecoveryAction::MarkFailed => "mark_failed",
        }
    }
}

/// Operator-requested recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceRecoveryAction {
    /// Rewind to the latest checkpoint (if any) and resume.
    Restart,
    Complete,
    Fail,
}

impl ForceRecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForceRecoveryAction::Restart => "restart",
            ForceRecoveryAction::Complete => "complete",
            ForceRecoveryAction::Fail => "fail",
        }
    }
}

impl std::str::FromStr for ForceRecoveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "restart" => Ok(ForceRecoveryAction::Restart),
            "complete" => Ok(ForceRecoveryAction::Complete),
            "fail" => Ok(ForceRecoveryAction::Fail),
            other => Err(format!("unknown recovery action '{}'", other)),
        }
    }
}

/// Latest health observation for one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub flow_id: FlowId,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    pub current_phase: String,
    #[serde(with = "humantime_serde")]
    pub phase_elapsed: Duration,
    #[serde(with = "humantime_serde")]
    pub total_elapsed: Duration,
    pub last_recovery_at: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// Whether an auto-recovery happened less than `cooldown` before `now`.
    pub fn in_recovery_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_recovery_at
            .map(|at| elapsed_since(at, now) < cooldown)
            .unwrap_or(false)
    }
}

/// Tracked flows per health status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub by_status: BTreeMap<HealthStatus, usize>,
}

impl HealthSummary {
    pub fn count(&self, status: HealthStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::flow::FlowType;
    use crate::domain::tenant::TenantKey;
    use chrono::Duration as ChronoDuration;

    fn flow_in(phase: &str) -> Flow {
        let mut flow = Flow::new(FlowType::Discovery, TenantKey::new("c", "e"));
        flow.start();
        flow.enter_phase(phase);
        flow
    }

    fn age(flow: &mut Flow, total_mins: i64, idle_mins: i64) {
        let now = Utc::now();
        flow.created_at = now - ChronoDuration::minutes(total_mins);
        flow.updated_at = now - ChronoDuration::minutes(idle_mins);
    }

    #[test]
    fn test_fresh_flow_is_healthy() {
        let flow = flow_in(phases::DATA_IMPORT);
        let a = assess_health(&flow, Utc::now(), &HealthMonitorConfig::default());
        assert_eq!(a.status, HealthStatus::Healthy);
        assert!(a.reason.is_none());
    }

    #[test]
    fn test_failed_wins() {
        let mut flow = flow_in(phases::DATA_IMPORT);
        age(&mut flow, 500, 500);
        flow.set_status(FlowStatus::Failed);
        flow.updated_at = Utc::now() - ChronoDuration::minutes(500);
        let a = assess_health(&flow, Utc::now(), &HealthMonitorConfig::default());
        assert_eq!(a.status, HealthStatus::Failed);
    }

    #[test]
    fn test_phase_timeout_is_hanging() {
        let mut flow = flow_in(phases::DEPENDENCY_ANALYSIS);
        age(&mut flow, 40, 31);
        let a = assess_health(&flow, Utc::now(), &HealthMonitorConfig::default());
        assert_eq!(a.status, HealthStatus::Hanging);
        assert!(a.phase_elapsed >= Duration::from_secs(31 * 60));
    }

    #[test]
    fn test_initialization_has_short_timeout() {
        let mut flow = flow_in(phases::INITIALIZATION);
        age(&mut flow, 6, 6);
        let a = assess_health(&flow, Utc::now(), &HealthMonitorConfig::default());
        assert_eq!(a.status, HealthStatus::Hanging);
    }

    #[test]
    fn test_total_duration_thresholds() {
        let config = HealthMonitorConfig::default();
        let mut flow = flow_in(phases::ASSET_INVENTORY);
        flow.progress_percentage = 50.0;

        age(&mut flow, 61, 1);
        assert_eq!(assess_health(&flow, Utc::now(), &config).status, HealthStatus::Warning);

        age(&mut flow, 121, 1);
        assert_eq!(assess_health(&flow, Utc::now(), &config).status, HealthStatus::Critical);
    }

    #[test]
    fn test_stagnation_warning() {
        let config = HealthMonitorConfig::default();
        let mut flow = flow_in(phases::DATA_IMPORT);
        flow.progress_percentage = 2.0;
        age(&mut flow, 35, 2);
        let a = assess_health(&flow, Utc::now(), &config);
        assert_eq!(a.status, HealthStatus::Warning);

        flow.progress_percentage = 40.0;
        assert_eq!(assess_health(&flow, Utc::now(), &config).status, HealthStatus::Healthy);
    }

    #[test]
    fn test_hanging_action_by_phase() {
        assert_eq!(
            HangingRecoveryAction::for_phase(phases::FIELD_MAPPING),
            HangingRecoveryAction::AwaitUserInput
        );
        assert_eq!(
            HangingRecoveryAction::for_phase(phases::TECH_DEBT_ANALYSIS),
            HangingRecoveryAction::CompleteWithPartialResult
        );
        assert_eq!(
            HangingRecoveryAction::for_phase(phases::DATA_IMPORT),
            HangingRecoveryAction::MarkFailed
        );
    }

    #[test]
    fn test_cooldown() {
        let now = Utc::now();
        let mut record = HealthRecord {
            flow_id: FlowId::new(),
            status: HealthStatus::Hanging,
            last_check: now,
            current_phase: phases::DATA_IMPORT.to_string(),
            phase_elapsed: Duration::ZERO,
            total_elapsed: Duration::ZERO,
            last_recovery_at: None,
        };
        let cooldown = Duration::from_secs(600);
        assert!(!record.in_recovery_cooldown(now, cooldown));
        record.last_recovery_at = Some(now - ChronoDuration::minutes(5));
        assert!(record.in_recovery_cooldown(now, cooldown));
        record.last_recovery_at = Some(now - ChronoDuration::minutes(11));
        assert!(!record.in_recovery_cooldown(now, cooldown));
    }

    #[test]
    fn test_config_yaml_durations() {
        let yaml = "scan_interval: 30s\nphase_timeouts:\n  field_mapping: 45m\n";
        let config: HealthMonitorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.timeout_for(phases::FIELD_MAPPING), Duration::from_secs(45 * 60));
        assert_eq!(config.timeout_for("finalization"), Duration::from_secs(30 * 60));
        assert!(config.enabled);
    }

    #[test]
    fn test_force_action_parse() {
        assert_eq!("Restart".parse::<ForceRecoveryAction>(), Ok(ForceRecoveryAction::Restart));
        assert!("rewind".parse::<ForceRecoveryAction>().is_err());
    }
}
