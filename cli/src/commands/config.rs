// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use flowguard_core::domain::config::{CheckpointBackend, ResilienceConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML instead of a summary
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./flowguard-config.yaml)
        #[arg(short, long, default_value = "./flowguard-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = ResilienceConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. FLOWGUARD_CONFIG_PATH: {}",
            std::env::var("FLOWGUARD_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./flowguard-config.yaml");
        println!("  4. ~/.flowguard/config.yaml");
        println!("  5. /etc/flowguard/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let spec = &config.spec;

    println!("{}", "Retry:".bold());
    println!(
        "  Default: {} attempts, {:?} base, {:?} max",
        spec.retry.default.max_retries, spec.retry.default.base_delay, spec.retry.default.max_delay
    );
    let mut phases: Vec<_> = spec.retry.phases.iter().collect();
    phases.sort_by(|a, b| a.0.cmp(b.0));
    for (phase, policy) in phases {
        println!(
            "  {}: {} attempts, {:?} base, {:?} max",
            phase, policy.max_retries, policy.base_delay, policy.max_delay
        );
    }
    println!();

    println!("{}", "Recovery:".bold());
    println!("  Transient attempt gate: {}", spec.recovery.transient_attempt_gate);
    println!("  Resource attempt gate: {}", spec.recovery.resource_attempt_gate);
    println!(
        "  Prefer checkpoint for resource errors: {}",
        spec.recovery.prefer_checkpoint_for_resource
    );
    println!("  Skippable phases: {}", spec.recovery.skippable_phases.join(", "));
    println!();

    println!("{}", "Checkpoints:".bold());
    let backend = match spec.checkpoints.backend {
        CheckpointBackend::Memory => "memory",
        CheckpointBackend::Postgres => "postgres",
    };
    println!("  Backend: {}", backend);
    println!("  Retention: {}", spec.checkpoints.retention);
    println!("  Safe phases: {}", spec.checkpoints.safe_phases.join(", "));
    println!();

    println!("{}", "Health monitor:".bold());
    println!("  Enabled: {}", spec.health.enabled);
    println!("  Scan interval: {:?}", spec.health.scan_interval);
    println!(
        "  Warning / critical after: {:?} / {:?}",
        spec.health.warning_threshold, spec.health.critical_threshold
    );
    println!("  Recovery cooldown: {:?}", spec.health.recovery_cooldown);
    println!();

    println!("{}", "Tenant pool:".bold());
    println!("  Enabled: {}", spec.pool.enabled);
    println!("  Idle threshold: {:?}", spec.pool.idle_threshold);
    println!("  Sweep interval: {:?}", spec.pool.sweep_interval);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ResilienceConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Sample manifest text: the annotated template, or the defaults as YAML.
pub fn sample_config(with_examples: bool) -> Result<String> {
    if with_examples {
        return Ok(include_str!("../../templates/config-with-examples.yaml").to_string());
    }
    Ok(serde_yaml::to_string(&ResilienceConfigManifest::default())?)
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = sample_config(with_examples)?;
    tracing::debug!(path = %output.display(), with_examples, "Writing sample configuration");

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
