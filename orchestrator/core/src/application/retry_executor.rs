// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! Retry Executor
//!
//! Wraps any fallible async operation in the backoff policy from
//! `domain::retry`. Each failure is classified; permanent errors abort at
//! once, everything else is retried until the category's attempt ceiling.
//! Backoff sleeps race a [`CancellationToken`] so shutdown is never delayed
//! by a pending retry.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Generic retry-with-backoff used by the recovery orchestrator

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::error_classification::{classify, ErrorCategory, PhaseError};
use crate::domain::retry::RetryPolicy;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError {
    #[error("Permanent failure after {attempts} attempt(s): {error}")]
    Aborted { attempts: u32, error: PhaseError },

    #[error("Retries exhausted after {attempts} attempt(s): {error}")]
    Exhausted {
        attempts: u32,
        category: ErrorCategory,
        error: PhaseError,
    },

    #[error("Retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        attempts: u32,
        last_error: Option<PhaseError>,
    },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Aborted { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> Option<&PhaseError> {
        match self {
            RetryError::Aborted { error, .. } | RetryError::Exhausted { error, .. } => Some(error),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            RetryError::Aborted { .. } => "aborted",
            RetryError::Exhausted { .. } => "exhausted",
            RetryError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Invokes `operation` until it succeeds, fails permanently, exhausts the
/// policy, or `cancel` fires.
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PhaseError>>,
{
    let result = run(&mut operation, policy, cancel).await;
    record_call(&result);
    result.map(|(value, _)| value)
}

async fn run<T, F, Fut>(
    operation: &mut F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(T, u32), RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PhaseError>>,
{
    let mut attempts = 0u32;
    let mut last_error = None;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts, last_error });
        }

        attempts += 1;
        let error = match operation().await {
            Ok(value) => return Ok((value, attempts)),
            Err(error) => error,
        };

        let category = classify(&error);
        if category == ErrorCategory::Permanent {
            debug!(attempts, error = %error, "Permanent error, not retrying");
            return Err(RetryError::Aborted { attempts, error });
        }

        if !policy.should_retry(attempts, category) {
            return Err(RetryError::Exhausted { attempts, category, error });
        }

        let delay = policy.delay_for(attempts - 1, category);
        warn!(
            attempt = attempts,
            category = %category,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying after backoff"
        );
        last_error = Some(error);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { attempts, last_error });
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn record_call<T>(result: &Result<(T, u32), RetryError>) {
    let (outcome, attempts) = match result {
        Ok((_, attempts)) => ("success", *attempts),
        Err(e) => (e.outcome_label(), e.attempts()),
    };

    metrics::counter!("flowguard_retry_calls_total", "outcome" => outcome).increment(1);
    metrics::histogram!("flowguard_retry_attempts").record(attempts as f64);

    match result {
        Ok(_) => info!(outcome, attempts, "Retry call finished"),
        Err(e) => info!(
            outcome,
            attempts,
            last_error = e.last_error().map(|err| err.to_string()).unwrap_or_default(),
            "Retry call finished"
        ),
    }
}
