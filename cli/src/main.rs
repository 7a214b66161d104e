// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! # flowguard CLI
//!
//! Operator tooling for the flowguard resilience core.
//!
//! ## Commands
//!
//! - `flowguard config show|validate|generate` - Configuration management
//! - `flowguard classify <message>` - Preview how an error would be categorized
//! - `flowguard backoff <phase>` - Preview the retry delay schedule for a phase

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use flowguard_cli::commands::{
    self, backoff::BackoffCommand, classify::ClassifyCommand, ConfigCommand,
};
use flowguard_core::domain::config::{LoggingConfig, ResilienceConfigManifest};

/// flowguard - resilience tooling for long-running multi-tenant flows
#[derive(Parser)]
#[command(name = "flowguard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FLOWGUARD_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "FLOWGUARD_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Classify an error message
    #[command(name = "classify")]
    Classify(ClassifyCommand),

    /// Show the unjittered retry schedule for a phase
    #[command(name = "backoff")]
    Backoff(BackoffCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = ResilienceConfigManifest::load_or_default(cli.config.clone())
        .map(|c| c.spec.observability.logging)
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref(), &logging)?;
    tracing::debug!(config = ?cli.config, "flowguard CLI starting");

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Classify(command)) => commands::classify::execute(command).await,
        Some(Commands::Backoff(command)) => commands::backoff::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level_override: Option<&str>, logging: &LoggingConfig) -> Result<()> {
    let level = level_override.unwrap_or(&logging.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
