// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! `flowguard backoff` - print the unjittered retry schedule for a phase

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use flowguard_core::domain::config::ResilienceConfigManifest;
use flowguard_core::domain::error_classification::ErrorCategory;
use flowguard_core::domain::retry::PhasePolicies;

#[derive(Args)]
pub struct BackoffCommand {
    /// Phase name (falls back to the default policy if unconfigured)
    pub phase: String,

    /// Error category to compute delays for
    #[arg(long, default_value = "transient")]
    pub category: ErrorCategory,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct BackoffSchedule {
    pub phase: String,
    pub category: ErrorCategory,
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    pub delays_ms: Vec<u128>,
}

impl BackoffSchedule {
    pub fn compute(policies: &PhasePolicies, phase: &str, category: ErrorCategory) -> Self {
        let policy = policies.for_phase(phase);
        Self {
            phase: phase.to_string(),
            category,
            max_attempts: policy.max_attempts_for(category),
            max_delay: policy.max_delay,
            delays_ms: policy
                .schedule(category)
                .into_iter()
                .map(|d| d.as_millis())
                .collect(),
        }
    }
}

pub async fn execute(command: BackoffCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = ResilienceConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;

    if !config.spec.retry.phases.contains_key(&command.phase) {
        tracing::debug!(phase = %command.phase, "No phase policy configured, using default");
    }
    let schedule = BackoffSchedule::compute(&config.spec.retry, &command.phase, command.category);

    if command.json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    println!(
        "{} {} ({} errors, up to {} attempts)",
        "Backoff for".bold(),
        schedule.phase,
        schedule.category,
        schedule.max_attempts
    );
    if schedule.delays_ms.is_empty() {
        println!("  {}", "no retries for this category".yellow());
    }
    for (attempt, delay) in schedule.delays_ms.iter().enumerate() {
        println!("  after attempt {}: {:?}", attempt + 1, Duration::from_millis(*delay as u64));
    }

    Ok(())
}
