//! Database layer
//!
//! SeaORM entities for studies and questions, the `StudyStore` repository,
//! and the connection pool wrapper. The worker checks connectivity at boot
//! with [`DbPool::ping`] before it consumes any billable work.

pub mod models;
mod repository;

pub use repository::{NewQuestion, Repository, SaveOutcome, StudyStore};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Postgres connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Open a pool against the configured database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut opts = ConnectOptions::new(config.normalized_url());
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!(
            max_connections = config.max_connections,
            "Database pool ready"
        );

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Round-trip query to verify connectivity.
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })
    }
}
