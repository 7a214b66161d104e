// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! `flowguard classify` - run an error message through the classifier

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use flowguard_core::domain::error_classification::{ErrorCategory, PhaseError};

#[derive(Args)]
pub struct ClassifyCommand {
    /// Error message as the phase reported it
    pub message: String,

    /// Error type name (e.g. TimeoutError, MemoryError)
    #[arg(long, default_value = "RuntimeError")]
    pub kind: String,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassificationReport {
    pub kind: String,
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
    pub backoff_multiplier: f64,
}

impl ClassificationReport {
    pub fn new(kind: &str, message: &str) -> Self {
        let category = PhaseError::new(kind, message).category();
        Self {
            kind: kind.to_string(),
            message: message.to_string(),
            category,
            retryable: category.is_retryable(),
            backoff_multiplier: category.backoff_multiplier(),
        }
    }
}

pub async fn execute(command: ClassifyCommand) -> Result<()> {
    let report = ClassificationReport::new(&command.kind, &command.message);

    if command.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let category = match report.category {
        ErrorCategory::Transient => report.category.as_str().yellow(),
        ErrorCategory::Permanent => report.category.as_str().red(),
        ErrorCategory::Resource => report.category.as_str().magenta(),
        ErrorCategory::Unknown => report.category.as_str().dimmed(),
    };
    println!("{} {}", "Category:".bold(), category);
    println!("  Retryable: {}", report.retryable);
    println!("  Backoff multiplier: {}", report.backoff_multiplier);

    Ok(())
}
