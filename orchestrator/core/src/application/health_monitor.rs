// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Flow Health Monitor - background scan of active flows
//!
//! Every `scan_interval` the monitor loads active flows, classifies them with
//! [`assess_health`] and keeps the latest [`HealthRecord`] per flow. Hanging
//! flows get a phase-specific auto-recovery, at most once per
//! `recovery_cooldown`:
//!
//! - `field_mapping` is parked as `WaitingForUserInput`
//! - `dependency_analysis` / `tech_debt_analysis` complete with a partial result
//! - anything else is marked failed
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Hang detection, auto-recovery and operator-forced recovery

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::checkpoint_manager::CheckpointManager;
use crate::domain::checkpoint::CheckpointError;
use crate::domain::events::HealthEvent;
use crate::domain::flow::{
    Flow, FlowId, FlowStatus, AWAITING_USER_INPUT_MARKER, PARTIAL_RESULT_MARKER,
};
use crate::domain::health::{
    assess_health, ForceRecoveryAction, HangingRecoveryAction, HealthAssessment,
    HealthMonitorConfig, HealthRecord, HealthStatus, HealthSummary,
};
use crate::domain::repository::{FlowStore, RepositoryError};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, thiserror::Error)]
pub enum HealthMonitorError {
    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Counts from one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub alerting: usize,
    pub recovered: usize,
}

pub struct FlowHealthMonitor {
    flow_store: Arc<dyn FlowStore>,
    checkpoints: Arc<CheckpointManager>,
    config: HealthMonitorConfig,
    event_bus: EventBus,
    records: RwLock<HashMap<FlowId, HealthRecord>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl FlowHealthMonitor {
    pub fn new(
        flow_store: Arc<dyn FlowStore>,
        checkpoints: Arc<CheckpointManager>,
        config: HealthMonitorConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            flow_store,
            checkpoints,
            config,
            event_bus,
            records: RwLock::new(HashMap::new()),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Spawns the scan loop. Returns `false` when disabled or already running.
    pub fn start_monitoring(self: &Arc<Self>) -> bool {
        if !self.config.enabled {
            info!("Flow health monitor is disabled");
            return false;
        }
        if self.config.scan_interval.is_zero() {
            error!("Flow health monitor not started: scan_interval is zero");
            return false;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let monitor = Arc::clone(self);
        let loop_token = token.clone();
        let handle = tokio::spawn(async move { monitor.run(loop_token).await });
        *task = Some((token, handle));
        true
    }

    /// Cancels the scan loop and waits for it to exit.
    pub async fn stop_monitoring(&self) {
        let Some((token, handle)) = self.task.lock().take() else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            warn!("Flow health monitor task ended abnormally: {}", e);
        }
    }

    async fn run(&self, shutdown: CancellationToken) {
        info!(
            scan_interval_secs = self.config.scan_interval.as_secs(),
            "Starting flow health monitor"
        );

        let mut tick = interval(self.config.scan_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.scan_once().await {
                        Ok(report) => debug!(
                            scanned = report.scanned,
                            alerting = report.alerting,
                            recovered = report.recovered,
                            "Health scan completed"
                        ),
                        Err(e) => warn!("Health scan failed: {}", e),
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping flow health monitor");
                    break;
                }
            }
        }

        info!("Flow health monitor stopped");
    }

    pub async fn scan_once(&self) -> Result<ScanReport, HealthMonitorError> {
        self.scan_at(Utc::now()).await
    }

    /// Runs one scan as of `now`.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> Result<ScanReport, HealthMonitorError> {
        let flows = self.flow_store.find_active().await?;
        let mut report = ScanReport::default();
        let mut seen = HashSet::with_capacity(flows.len());

        for flow in flows {
            seen.insert(flow.id);
            let previous = self.records.read().get(&flow.id).cloned();

            // failed flows are recorded once and then left alone
            if flow.status == FlowStatus::Failed
                && previous.as_ref().is_some_and(|r| r.status == HealthStatus::Failed)
            {
                continue;
            }
            report.scanned += 1;

            let assessment = assess_health(&flow, now, &self.config);
            let mut record = HealthRecord {
                flow_id: flow.id,
                status: assessment.status,
                last_check: now,
                current_phase: flow.current_phase.clone(),
                phase_elapsed: assessment.phase_elapsed,
                total_elapsed: assessment.total_elapsed,
                last_recovery_at: previous.and_then(|r| r.last_recovery_at),
            };

            if assessment.status.is_alerting() {
                report.alerting += 1;
                self.alert(&flow, &assessment, now);
            }

            if assessment.status == HealthStatus::Hanging {
                match self.auto_recover(&flow, &record, now).await {
                    Ok(true) => {
                        record.last_recovery_at = Some(now);
                        report.recovered += 1;
                    }
                    Ok(false) => {}
                    Err(e) => error!(flow_id = %flow.id, "Auto-recovery failed: {}", e),
                }
            }

            self.records.write().insert(flow.id, record);
        }

        self.records.write().retain(|id, _| seen.contains(id));
        Ok(report)
    }

    fn alert(&self, flow: &Flow, assessment: &HealthAssessment, now: DateTime<Utc>) {
        warn!(
            flow_id = %flow.id,
            phase = %flow.current_phase,
            status = %assessment.status,
            reason = assessment.reason.as_deref().unwrap_or_default(),
            "Unhealthy flow detected"
        );
        metrics::counter!(
            "flowguard_flow_health_detections_total",
            "status" => assessment.status.as_str()
        )
        .increment(1);
        self.event_bus.publish_health_event(HealthEvent::FlowHealthDetected {
            flow_id: flow.id,
            phase: flow.current_phase.clone(),
            status: assessment.status,
            phase_elapsed_secs: assessment.phase_elapsed.as_secs(),
            total_elapsed_secs: assessment.total_elapsed.as_secs(),
            reason: assessment.reason.clone(),
            detected_at: now,
        });
    }

    /// Applies the phase's hanging action. Returns whether anything changed.
    async fn auto_recover(
        &self,
        scanned: &Flow,
        record: &HealthRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, HealthMonitorError> {
        if record.in_recovery_cooldown(now, self.config.recovery_cooldown) {
            self.skip(scanned, "recovery cooldown active", now);
            return Ok(false);
        }
        if scanned.status.is_on_hold() {
            self.skip(scanned, on_hold_reason(scanned.status), now);
            return Ok(false);
        }

        // the host may have moved the flow on since it was listed
        let Some(mut flow) = self.flow_store.find_by_id(scanned.id).await? else {
            return Ok(false);
        };
        if flow.status.is_on_hold() {
            self.skip(&flow, on_hold_reason(flow.status), now);
            return Ok(false);
        }
        if flow.updated_at != scanned.updated_at
            || !flow.status.is_active()
            || flow.status == FlowStatus::Failed
        {
            self.skip(&flow, "flow changed since scan", now);
            return Ok(false);
        }

        let action = HangingRecoveryAction::for_phase(&flow.current_phase);
        match action {
            HangingRecoveryAction::AwaitUserInput => {
                flow.set_marker(AWAITING_USER_INPUT_MARKER, serde_json::Value::Bool(true));
                flow.set_status(FlowStatus::WaitingForUserInput);
            }
            HangingRecoveryAction::CompleteWithPartialResult => {
                complete_with_partial_result(&mut flow);
            }
            HangingRecoveryAction::MarkFailed => {
                let phase = flow.current_phase.clone();
                let message =
                    format!("phase '{}' hung and was failed by the health monitor", phase);
                flow.record_error(&phase, None, message);
                flow.set_status(FlowStatus::Failed);
            }
        }
        self.flow_store.save(&flow).await?;

        warn!(
            flow_id = %flow.id,
            phase = %flow.current_phase,
            action = action.as_str(),
            "Auto-recovery applied to hanging flow"
        );
        metrics::counter!("flowguard_auto_recoveries_total", "action" => action.as_str())
            .increment(1);
        self.event_bus.publish_health_event(HealthEvent::AutoRecoveryApplied {
            flow_id: flow.id,
            phase: flow.current_phase.clone(),
            action: action.as_str().to_string(),
            applied_at: now,
        });
        Ok(true)
    }

    fn skip(&self, flow: &Flow, reason: &str, now: DateTime<Utc>) {
        debug!(flow_id = %flow.id, reason, "Auto-recovery skipped");
        self.event_bus.publish_health_event(HealthEvent::AutoRecoverySkipped {
            flow_id: flow.id,
            phase: flow.current_phase.clone(),
            reason: reason.to_string(),
            skipped_at: now,
        });
    }

    pub fn get_flow_health(&self, flow_id: FlowId) -> Option<HealthRecord> {
        self.records.read().get(&flow_id).cloned()
    }

    pub fn health_summary(&self) -> HealthSummary {
        let records = self.records.read();
        let mut summary = HealthSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records.values() {
            *summary.by_status.entry(record.status).or_default() += 1;
        }
        summary
    }

    /// Operator override. Returns the flow as saved.
    pub async fn force_recover_flow(
        &self,
        flow_id: FlowId,
        action: ForceRecoveryAction,
    ) -> Result<Flow, HealthMonitorError> {
        let mut flow = self
            .flow_store
            .find_by_id(flow_id)
            .await?
            .ok_or(HealthMonitorError::FlowNotFound(flow_id))?;

        let mut checkpoint_id = None;
        match action {
            ForceRecoveryAction::Restart => {
                let phase = flow.current_phase.clone();
                let restored =
                    self.checkpoints.restore_latest_into(&mut flow, Some(&phase)).await?;
                checkpoint_id = restored.map(|r| r.checkpoint_id);
                flow.runtime_state.remove(AWAITING_USER_INPUT_MARKER);
                flow.set_status(FlowStatus::Running);
                flow.touch();
            }
            ForceRecoveryAction::Complete => complete_with_partial_result(&mut flow),
            ForceRecoveryAction::Fail => {
                let phase = flow.current_phase.clone();
                flow.record_error(&phase, None, "flow failed by operator");
                flow.set_status(FlowStatus::Failed);
            }
        }
        self.flow_store.save(&flow).await?;

        let now = Utc::now();
        if let Some(record) = self.records.write().get_mut(&flow_id) {
            record.last_recovery_at = Some(now);
        }

        info!(
            flow_id = %flow_id,
            action = action.as_str(),
            ?checkpoint_id,
            "Forced recovery applied"
        );
        self.event_bus.publish_health_event(HealthEvent::ForcedRecoveryApplied {
            flow_id,
            action: action.as_str().to_string(),
            checkpoint_id,
            applied_at: now,
        });
        Ok(flow)
    }
}

fn complete_with_partial_result(flow: &mut Flow) {
    flow.phase_completion.insert(flow.current_phase.clone(), true);
    flow.progress_percentage = 100.0;
    flow.set_marker(PARTIAL_RESULT_MARKER, serde_json::Value::Bool(true));
    flow.set_status(FlowStatus::Completed);
}

fn on_hold_reason(status: FlowStatus) -> &'static str {
    match status {
        FlowStatus::Paused => "flow is paused",
        _ => "flow is waiting for user input",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CheckpointConfig;
    use crate::domain::flow::{phases, FlowType};
    use crate::domain::tenant::TenantKey;
    use crate::infrastructure::event_bus::ResilienceEvent;
    use crate::infrastructure::repositories::{InMemoryCheckpointRepository, InMemoryFlowStore};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    struct Fixture {
        monitor: Arc<FlowHealthMonitor>,
        store: InMemoryFlowStore,
        checkpoints: Arc<CheckpointManager>,
        bus: EventBus,
    }

    fn fixture(config: HealthMonitorConfig) -> Fixture {
        let bus = EventBus::new(256);
        let store = InMemoryFlowStore::new();
        let checkpoints = Arc::new(CheckpointManager::new(
            Arc::new(InMemoryCheckpointRepository::new()),
            CheckpointConfig::default(),
            bus.clone(),
        ));
        let monitor = Arc::new(FlowHealthMonitor::new(
            Arc::new(store.clone()),
            checkpoints.clone(),
            config,
            bus.clone(),
        ));
        Fixture {
            monitor,
            store,
            checkpoints,
            bus,
        }
    }

    /// Running flow in `phase`, idle and alive for the given number of minutes.
    fn flow_in(phase: &str, idle_minutes: i64, age_minutes: i64) -> Flow {
        let mut flow = Flow::new(FlowType::Discovery, TenantKey::new("acme", "eng-1"));
        flow.start();
        flow.enter_phase(phase);
        flow.progress_percentage = 50.0;
        let now = Utc::now();
        flow.created_at = now - ChronoDuration::minutes(age_minutes);
        flow.updated_at = now - ChronoDuration::minutes(idle_minutes);
        flow
    }

    #[tokio::test]
    async fn test_healthy_flow_recorded() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::DATA_IMPORT, 1, 5);
        f.store.save(&flow).await.unwrap();

        let report = f.monitor.scan_once().await.unwrap();
        assert_eq!(report, ScanReport { scanned: 1, alerting: 0, recovered: 0 });

        let record = f.monitor.get_flow_health(flow.id).unwrap();
        assert_eq!(record.status, HealthStatus::Healthy);
        assert_eq!(record.current_phase, phases::DATA_IMPORT);
        assert_eq!(f.monitor.health_summary().count(HealthStatus::Healthy), 1);
    }

    #[tokio::test]
    async fn test_hanging_dependency_analysis_completes_with_partial_result() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::DEPENDENCY_ANALYSIS, 31, 45);
        f.store.save(&flow).await.unwrap();
        let mut events = f.bus.subscribe_flow(flow.id);

        let report = f.monitor.scan_once().await.unwrap();
        assert_eq!(report.recovered, 1);

        let saved = f.store.find_by_id(flow.id).await.unwrap().unwrap();
        assert_eq!(saved.status, FlowStatus::Completed);
        assert_eq!(saved.progress_percentage, 100.0);
        assert!(saved.has_marker(PARTIAL_RESULT_MARKER));
        assert_eq!(saved.phase_completion.get(phases::DEPENDENCY_ANALYSIS), Some(&true));

        let record = f.monitor.get_flow_health(flow.id).unwrap();
        assert_eq!(record.status, HealthStatus::Hanging);
        assert!(record.last_recovery_at.is_some());

        match events.recv().await.unwrap() {
            ResilienceEvent::Health(HealthEvent::FlowHealthDetected { status, .. }) => {
                assert_eq!(status, HealthStatus::Hanging)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().await.unwrap() {
            ResilienceEvent::Health(HealthEvent::AutoRecoveryApplied { action, .. }) => {
                assert_eq!(action, "complete_with_partial_result")
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_field_mapping_waits_for_user() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::FIELD_MAPPING, 25, 30);
        f.store.save(&flow).await.unwrap();

        f.monitor.scan_once().await.unwrap();
        let saved = f.store.find_by_id(flow.id).await.unwrap().unwrap();
        assert_eq!(saved.status, FlowStatus::WaitingForUserInput);
        assert!(saved.has_marker(AWAITING_USER_INPUT_MARKER));
    }

    #[tokio::test]
    async fn test_hanging_other_phase_marked_failed_once() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::DATA_IMPORT, 20, 20);
        f.store.save(&flow).await.unwrap();

        f.monitor.scan_once().await.unwrap();
        let saved = f.store.find_by_id(flow.id).await.unwrap().unwrap();
        assert_eq!(saved.status, FlowStatus::Failed);
        assert_eq!(saved.errors.len(), 1);

        // next scan records the failure, the one after that skips it
        let second = f.monitor.scan_once().await.unwrap();
        assert_eq!(second.scanned, 1);
        assert_eq!(f.monitor.get_flow_health(flow.id).unwrap().status, HealthStatus::Failed);

        let third = f.monitor.scan_once().await.unwrap();
        assert_eq!(third.scanned, 0);
        assert!(f.monitor.get_flow_health(flow.id).is_some());
    }

    #[tokio::test]
    async fn test_paused_flow_is_not_auto_recovered() {
        let f = fixture(HealthMonitorConfig::default());
        for phase in [phases::DATA_IMPORT, phases::DEPENDENCY_ANALYSIS] {
            let mut flow = flow_in(phase, 40, 45);
            flow.status = FlowStatus::Paused;
            f.store.save(&flow).await.unwrap();
        }
        let mut events = f.bus.subscribe();

        let report = f.monitor.scan_once().await.unwrap();
        assert_eq!(report.alerting, 2);
        assert_eq!(report.recovered, 0);

        for flow in f.store.list_all().await.unwrap() {
            assert_eq!(flow.status, FlowStatus::Paused);
            assert!(flow.errors.is_empty());
            assert!(!flow.has_marker(PARTIAL_RESULT_MARKER));
            assert_eq!(f.monitor.get_flow_health(flow.id).unwrap().status, HealthStatus::Hanging);
        }

        let mut skipped = 0;
        while let Ok(event) = events.try_recv() {
            if let ResilienceEvent::Health(HealthEvent::AutoRecoverySkipped { reason, .. }) = event
            {
                assert_eq!(reason, "flow is paused");
                skipped += 1;
            }
        }
        assert_eq!(skipped, 2);
    }

    #[tokio::test]
    async fn test_cooldown_blocks_repeat_recovery() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::DATA_IMPORT, 20, 20);
        f.store.save(&flow).await.unwrap();

        f.monitor.records.write().insert(
            flow.id,
            HealthRecord {
                flow_id: flow.id,
                status: HealthStatus::Hanging,
                last_check: Utc::now(),
                current_phase: flow.current_phase.clone(),
                phase_elapsed: Duration::ZERO,
                total_elapsed: Duration::ZERO,
                last_recovery_at: Some(Utc::now() - ChronoDuration::minutes(2)),
            },
        );

        let report = f.monitor.scan_once().await.unwrap();
        assert_eq!(report.alerting, 1);
        assert_eq!(report.recovered, 0);
        let saved = f.store.find_by_id(flow.id).await.unwrap().unwrap();
        assert_eq!(saved.status, FlowStatus::Running);
    }

    #[tokio::test]
    async fn test_critical_long_running_flow() {
        let f = fixture(HealthMonitorConfig::default());
        let flow = flow_in(phases::DATA_IMPORT, 1, 180);
        f.store.save(&flow).await.unwrap();

        let report = f.monitor.scan_once().await.unwrap();
        assert_eq!(report.alerting, 1);
        assert_eq!(f.monitor.get_flow_health(flow.id).unwrap().status, HealthStatus::Critical);
        assert_eq!(
            f.store.find_by_id(flow.id).await.unwrap().unwrap().status,
            FlowStatus::Running
        );
    }

    #[tokio::test]
    async fn test_completed_flows_drop_out_of_records() {
        let f = fixture(HealthMonitorConfig::default());
        let mut flow = flow_in(phases::DATA_IMPORT, 1, 1);
        f.store.save(&flow).await.unwrap();
        f.monitor.scan_once().await.unwrap();
        assert!(f.monitor.get_flow_health(flow.id).is_some());

        flow.set_status(FlowStatus::Completed);
        f.store.save(&flow).await.unwrap();
        f.monitor.scan_once().await.unwrap();
        assert!(f.monitor.get_flow_health(flow.id).is_none());
        assert_eq!(f.monitor.health_summary().total, 0);
    }

    #[tokio::test]
    async fn test_force_restart_restores_checkpoint() {
        let f = fixture(HealthMonitorConfig::default());
        let mut flow = flow_in(phases::DATA_CLEANSING, 1, 1);
        flow.progress_percentage = 42.0;
        let checkpoint_id = f
            .checkpoints
            .create_checkpoint(&flow, phases::DATA_CLEANSING, Default::default())
            .await
            .unwrap();

        flow.enter_phase(phases::ASSET_INVENTORY);
        flow.set_status(FlowStatus::Failed);
        f.store.save(&flow).await.unwrap();
        let mut events = f.bus.subscribe_flow(flow.id);

        let restarted =
            f.monitor.force_recover_flow(flow.id, ForceRecoveryAction::Restart).await.unwrap();
        assert_eq!(restarted.status, FlowStatus::Running);
        assert_eq!(restarted.current_phase, phases::DATA_CLEANSING);
        assert_eq!(restarted.progress_percentage, 42.0);

        let forced = loop {
            if let ResilienceEvent::Health(event) = events.recv().await.unwrap() {
                break event;
            }
        };
        match forced {
            HealthEvent::ForcedRecoveryApplied { action, checkpoint_id: restored, .. } => {
                assert_eq!(action, "restart");
                assert_eq!(restored, Some(checkpoint_id));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_force_complete_and_fail() {
        let f = fixture(HealthMonitorConfig::default());
        let a = flow_in(phases::DATA_IMPORT, 1, 1);
        let b = flow_in(phases::DATA_IMPORT, 1, 1);
        f.store.save(&a).await.unwrap();
        f.store.save(&b).await.unwrap();

        let completed =
            f.monitor.force_recover_flow(a.id, ForceRecoveryAction::Complete).await.unwrap();
        assert_eq!(completed.status, FlowStatus::Completed);
        assert_eq!(completed.progress_percentage, 100.0);

        let failed = f.monitor.force_recover_flow(b.id, ForceRecoveryAction::Fail).await.unwrap();
        assert_eq!(failed.status, FlowStatus::Failed);

        let missing = f.monitor.force_recover_flow(FlowId::new(), ForceRecoveryAction::Fail).await;
        assert!(matches!(missing, Err(HealthMonitorError::FlowNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_monitoring() {
        let f = fixture(HealthMonitorConfig {
            scan_interval: Duration::from_secs(5),
            ..Default::default()
        });
        let flow = flow_in(phases::DATA_IMPORT, 1, 1);
        f.store.save(&flow).await.unwrap();

        assert!(f.monitor.start_monitoring());
        assert!(!f.monitor.start_monitoring());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.monitor.get_flow_health(flow.id).is_some());

        f.monitor.stop_monitoring().await;
        assert!(!f.monitor.is_running());
    }

    #[tokio::test]
    async fn test_disabled_monitor_does_not_start() {
        let f = fixture(HealthMonitorConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!f.monitor.start_monitoring());
        assert!(!f.monitor.is_running());
    }

    #[tokio::test]
    async fn test_zero_scan_interval_does_not_start() {
        let f = fixture(HealthMonitorConfig {
            scan_interval: Duration::ZERO,
            ..Default::default()
        });
        assert!(!f.monitor.start_monitoring());
        assert!(!f.monitor.is_running());
    }
}
