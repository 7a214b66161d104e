// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Retry Policy & Backoff Calculation
//!
//! `delay = base_delay × exponential_base^attempt × category multiplier`,
//! clamped to `[MIN_DELAY, max_delay]`, then perturbed by ±20% jitter and
//! floored at [`MIN_DELAY`] again.
//!
//! The unjittered value is monotonically non-decreasing in `attempt`, which
//! makes [`RetryPolicy::base_delay_for`] the function to test and to preview
//! schedules with; [`RetryPolicy::delay_for`] is what the executor sleeps on.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::error_classification::ErrorCategory;
use crate::domain::flow::phases;

/// Lower bound for any computed delay.
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for any computed delay, whatever `max_delay` says.
pub const MAX_DELAY_CEILING: Duration = Duration::from_secs(24 * 60 * 60);

/// Relative jitter applied to every delay (±20%).
pub const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts for retryable categories.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    /// Disable to get deterministic delays (tests, previews).
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attempt ceiling for `category`. `Unknown` errors get one attempt less
    /// than the policy maximum (but at least one); `Permanent` gets none.
    pub fn max_attempts_for(&self, category: ErrorCategory) -> u32 {
        match category {
            ErrorCategory::Permanent => 0,
            ErrorCategory::Unknown => self.max_retries.saturating_sub(1).max(1),
            ErrorCategory::Transient | ErrorCategory::Resource => self.max_retries,
        }
    }

    /// Whether another attempt is allowed after `attempts` failed ones.
    pub fn should_retry(&self, attempts: u32, category: ErrorCategory) -> bool {
        category.is_retryable() && attempts < self.max_attempts_for(category)
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (0-indexed), without jitter.
    pub fn base_delay_for(&self, attempt: u32, category: ErrorCategory) -> Duration {
        let max = self.max_delay.clamp(MIN_DELAY, MAX_DELAY_CEILING).as_secs_f64();
        // 2^64 already dwarfs any sane max_delay
        let exp = attempt.min(64) as i32;
        let raw = self.base_delay.as_secs_f64()
            * self.exponential_base.max(1.0).powi(exp)
            * category.backoff_multiplier();
        let secs = if raw.is_finite() { raw } else { max };
        Duration::from_secs_f64(secs.clamp(MIN_DELAY.as_secs_f64(), max))
    }

    /// Delay with ±20% jitter applied (if enabled), never below [`MIN_DELAY`].
    pub fn delay_for(&self, attempt: u32, category: ErrorCategory) -> Duration {
        let base = self.base_delay_for(attempt, category);
        if !self.jitter {
            return base;
        }
        let factor = rand::rng().random_range(-JITTER_FRACTION..=JITTER_FRACTION);
        let jittered = base.as_secs_f64() * (1.0 + factor);
        Duration::from_secs_f64(jittered.max(MIN_DELAY.as_secs_f64()))
    }

    /// Unjittered delay schedule for every permitted attempt.
    pub fn schedule(&self, category: ErrorCategory) -> Vec<Duration> {
        (0..self.max_attempts_for(category))
            .map(|attempt| self.base_delay_for(attempt, category))
            .collect()
    }
}

/// Per-phase policy table with a fallback default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePolicies {
    #[serde(default)]
    pub default: RetryPolicy,
    #[serde(default = "default_phase_policies")]
    pub phases: HashMap<String, RetryPolicy>,
}

impl Default for PhasePolicies {
    fn default() -> Self {
        Self {
            default: RetryPolicy::default(),
            phases: default_phase_policies(),
        }
    }
}

impl PhasePolicies {
    pub fn for_phase(&self, phase: &str) -> &RetryPolicy {
        self.phases.get(phase).unwrap_or(&self.default)
    }
}

fn default_phase_policies() -> HashMap<String, RetryPolicy> {
    let secs = Duration::from_secs;
    HashMap::from([
        (phases::DATA_IMPORT.to_string(), RetryPolicy::new(3, secs(1), secs(30))),
        (phases::FIELD_MAPPING.to_string(), RetryPolicy::new(3, secs(2), secs(30))),
        (phases::DATA_CLEANSING.to_string(), RetryPolicy::new(3, secs(2), secs(60))),
        (phases::ASSET_INVENTORY.to_string(), RetryPolicy::new(3, secs(2), secs(60))),
        (phases::DEPENDENCY_ANALYSIS.to_string(), RetryPolicy::new(2, secs(5), secs(120))),
        (phases::TECH_DEBT_ANALYSIS.to_string(), RetryPolicy::new(2, secs(5), secs(120))),
    ])
}
