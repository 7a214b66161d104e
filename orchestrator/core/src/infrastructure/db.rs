// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Thin `Database` handle over `sqlx::PgPool`, opened from the checkpoint
//! section of the manifest when `spec.checkpoints.backend` is `postgres`.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::domain::config::CheckpointConfig;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;

        tracing::debug!(max_connections, "Connected to checkpoint database");
        Ok(Self { pool })
    }

    /// Opens the pool described by `config`; fails if no database URL is set.
    pub async fn from_checkpoint_config(config: &CheckpointConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("checkpoints.database_url is required for the postgres backend")?;
        Self::connect(url, config.database_max_connections)
            .await
            .context("Failed to connect to checkpoint database")
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
