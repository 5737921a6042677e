//! Postgres-backed lead documents in the `leads` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadfunnel_core::{Lead, LeadFields, LeadId};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, LeadStore};

/// A row from the `leads` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRow {
    pub id: Uuid,
    pub fields: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = DbError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        let id = LeadId::from(row.id);
        match row.fields.0 {
            serde_json::Value::Object(fields) => Ok(Lead {
                id,
                fields,
                created_at: row.created_at,
                updated_at: row.updated_at,
            }),
            _ => Err(DbError::Corrupt { id }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn create(&self, fields: LeadFields) -> Result<Lead, DbError> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, LeadRow>(
            "INSERT INTO leads (id, fields) VALUES ($1, $2) \
             RETURNING id, fields, created_at, updated_at",
        )
        .bind(id)
        .bind(Json(serde_json::Value::Object(fields)))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(lead_id = %id, "lead created");
        Lead::try_from(row)
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>, DbError> {
        let row = sqlx::query_as::<_, LeadRow>(
            "SELECT id, fields, created_at, updated_at FROM leads WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lead::try_from).transpose()
    }

    /// Locks the row, applies the merge rules in Rust, and writes the
    /// merged document back in one transaction.
    async fn update(&self, id: LeadId, fields: LeadFields) -> Result<Lead, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, LeadRow>(
            "SELECT id, fields, created_at, updated_at FROM leads WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound(id))?;

        let mut lead = Lead::try_from(row)?;
        lead.merge(fields, Utc::now());

        let row = sqlx::query_as::<_, LeadRow>(
            "UPDATE leads SET fields = $2, updated_at = $3 WHERE id = $1 \
             RETURNING id, fields, created_at, updated_at",
        )
        .bind(id.as_uuid())
        .bind(Json(serde_json::Value::Object(lead.fields)))
        .bind(lead.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Lead::try_from(row)
    }
}
