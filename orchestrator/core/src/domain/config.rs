// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

// Resilience Configuration Types
//
// Defines the configuration schema for the flow resilience core:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Retry policies (default + per phase)
// - Recovery gates and checkpoint retention
// - Health monitor thresholds and phase timeouts
// - Tenant pool eviction settings
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::flow::phases;
use crate::domain::health::HealthMonitorConfig;
use crate::domain::recovery::RecoveryPolicy;
use crate::domain::retry::{PhasePolicies, MAX_DELAY_CEILING};

pub const API_VERSION: &str = "flowguard/v1";
pub const KIND: &str = "ResilienceConfig";

/// Top-level Kubernetes-style resilience configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfigManifest {
    /// API version (must be "flowguard/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ResilienceConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ResilienceConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Content under spec:
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfigSpec {
    #[serde(default)]
    pub retry: PhasePolicies,

    #[serde(default)]
    pub recovery: RecoveryPolicy,

    #[serde(default)]
    pub checkpoints: CheckpointConfig,

    #[serde(default)]
    pub health: HealthMonitorConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Checkpoints kept per flow; older ones are pruned
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Phases whose state is small and re-enterable
    #[serde(default = "default_safe_phases")]
    pub safe_phases: Vec<String>,

    /// Encoded size above which a payload field is left out of a checkpoint
    #[serde(default = "default_max_field_bytes")]
    pub max_field_bytes: usize,

    #[serde(default = "default_backend")]
    pub backend: CheckpointBackend,

    /// Required when backend is "postgres" (overridable via FLOWGUARD_DATABASE_URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Connection pool size for the postgres backend
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            safe_phases: default_safe_phases(),
            max_field_bytes: default_max_field_bytes(),
            backend: default_backend(),
            database_url: None,
            database_max_connections: default_database_max_connections(),
        }
    }
}

impl CheckpointConfig {
    pub fn is_safe_phase(&self, phase: &str) -> bool {
        self.safe_phases.iter().any(|p| p == phase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tenants idle longer than this are evicted
    #[serde(default = "default_idle_threshold", with = "humantime_serde")]
    pub idle_threshold: Duration,

    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            idle_threshold: default_idle_threshold(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

fn default_retention() -> usize {
    5
}

fn default_safe_phases() -> Vec<String> {
    [
        phases::DATA_IMPORT,
        phases::FIELD_MAPPING,
        phases::DATA_CLEANSING,
        phases::ASSET_INVENTORY,
        phases::DEPENDENCY_ANALYSIS,
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_max_field_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_backend() -> CheckpointBackend {
    CheckpointBackend::Memory
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_idle_threshold() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ResilienceConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "flowguard".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ResilienceConfigSpec::default(),
        }
    }
}

impl ResilienceConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. FLOWGUARD_CONFIG_PATH environment variable
    /// 2. ./flowguard-config.yaml (working directory)
    /// 3. ~/.flowguard/config.yaml (user home)
    /// 4. /etc/flowguard/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FLOWGUARD_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./flowguard-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".flowguard").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/flowguard/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("FLOWGUARD_HEALTH_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: FLOWGUARD_HEALTH_ENABLED=true");
                    self.spec.health.enabled = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: FLOWGUARD_HEALTH_ENABLED=false");
                    self.spec.health.enabled = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for FLOWGUARD_HEALTH_ENABLED: '{}'. \
                         Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(val) = lookup("FLOWGUARD_POOL_IDLE_THRESHOLD") {
            match serde_yaml::from_str::<humantime_serde::Serde<Duration>>(&val) {
                Ok(threshold) => {
                    tracing::info!("Environment override: FLOWGUARD_POOL_IDLE_THRESHOLD={}", val);
                    self.spec.pool.idle_threshold = threshold.into_inner();
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for FLOWGUARD_POOL_IDLE_THRESHOLD: '{}'. \
                         Expected a duration like '12h'. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(url) = lookup("FLOWGUARD_DATABASE_URL") {
            tracing::info!("Environment override: FLOWGUARD_DATABASE_URL set");
            self.spec.checkpoints.database_url = Some(url);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        let policies = std::iter::once(("default".to_string(), &spec.retry.default)).chain(
            spec.retry
                .phases
                .iter()
                .map(|(phase, policy)| (format!("phases.{}", phase), policy)),
        );
        for (name, policy) in policies {
            if policy.max_retries == 0 {
                anyhow::bail!("spec.retry.{}.max_retries must be at least 1", name);
            }
            if policy.max_delay < policy.base_delay {
                anyhow::bail!("spec.retry.{}: max_delay is shorter than base_delay", name);
            }
            if policy.max_delay > MAX_DELAY_CEILING {
                anyhow::bail!(
                    "spec.retry.{}.max_delay ({:?}) exceeds the {:?} ceiling",
                    name,
                    policy.max_delay,
                    MAX_DELAY_CEILING
                );
            }
            if !policy.exponential_base.is_finite() || policy.exponential_base < 1.0 {
                anyhow::bail!("spec.retry.{}.exponential_base must be a finite number >= 1", name);
            }
        }

        if spec.checkpoints.database_max_connections == 0 {
            anyhow::bail!("spec.checkpoints.database_max_connections must be at least 1");
        }
        if spec.checkpoints.retention == 0 {
            anyhow::bail!("spec.checkpoints.retention must be at least 1");
        }
        if spec.checkpoints.safe_phases.is_empty() {
            anyhow::bail!("spec.checkpoints.safe_phases cannot be empty");
        }
        if spec.checkpoints.backend == CheckpointBackend::Postgres
            && spec.checkpoints.database_url.is_none()
        {
            anyhow::bail!("spec.checkpoints.database_url is required for the postgres backend");
        }

        if spec.health.warning_threshold >= spec.health.critical_threshold {
            anyhow::bail!(
                "spec.health.warning_threshold ({:?}) must be shorter than \
                 critical_threshold ({:?})",
                spec.health.warning_threshold,
                spec.health.critical_threshold
            );
        }
        if spec.health.scan_interval.is_zero() {
            anyhow::bail!("spec.health.scan_interval cannot be zero");
        }

        if spec.pool.sweep_interval.is_zero() {
            anyhow::bail!("spec.pool.sweep_interval cannot be zero");
        }

        match spec.observability.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("Unsupported log format '{}'. Expected text or json", other),
        }

        Ok(())
    }
}
