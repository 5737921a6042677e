//! Lead record store gateway.
//!
//! [`LeadStore`] is the document-style CRUD surface the rest of the
//! workspace talks to. [`PgLeadStore`] keeps leads as JSONB rows;
//! [`MemoryLeadStore`] backs development runs without `DATABASE_URL` and
//! tests.

mod leads;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use leadfunnel_core::{AppConfig, Lead, LeadFields, LeadId};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub use leads::{LeadRow, PgLeadStore};
pub use memory::MemoryLeadStore;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/leadfunnel-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("lead not found: {0}")]
    NotFound(LeadId),
    #[error("stored lead {id} is not a JSON object")]
    Corrupt { id: LeadId },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// `false` when retrying the same call cannot succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(self, DbError::NotFound(_) | DbError::Corrupt { .. })
    }
}

/// Document-style access to lead records.
///
/// Updates are shallow partial merges (see [`Lead::merge`]); nothing in this
/// workspace deletes a lead.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Creates a lead holding `fields` and returns it with its new id.
    async fn create(&self, fields: LeadFields) -> Result<Lead, DbError>;

    async fn get(&self, id: LeadId) -> Result<Option<Lead>, DbError>;

    /// Merges `fields` into an existing lead.
    ///
    /// Implementations return [`DbError::NotFound`] for an unknown id.
    async fn update(&self, id: LeadId, fields: LeadFields) -> Result<Lead, DbError>;
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
