//! PostgreSQL audit table.
//!
//! The table name comes from configuration, so statements are built at
//! runtime with `sqlx::query` rather than checked at compile time. The name is
//! restricted to a plain SQL identifier before it is ever interpolated.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use super::{AuditRecord, AuditStore};
use crate::error::{IntakeError, Result};

#[derive(Debug, Clone)]
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PostgresAuditStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(IntakeError::Config(format!(
                "invalid audit table name: {:?}",
                table
            )));
        }
        Ok(Self { pool, table })
    }

    /// Connect and make sure the table exists.
    pub async fn connect(database_url: &str, table: impl Into<String>) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool, table)?;
        store.ensure_table().await?;
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the audit table if it is missing.
    pub async fn ensure_table(&self) -> Result<()> {
        let statement = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                notify_email TEXT NOT NULL,
                source_url TEXT NOT NULL,
                outcome_kind TEXT NOT NULL,
                detail TEXT NOT NULL,
                notify_sent BOOLEAN NOT NULL,
                size_bytes BIGINT,
                location TEXT,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
            self.table
        );
        sqlx::query(&statement).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    #[tracing::instrument(skip(self, record), fields(table = %self.table, run_id = %record.id))]
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let size_bytes = record
            .size_bytes
            .map(i64::try_from)
            .transpose()
            .map_err(|_| IntakeError::Audit("size_bytes does not fit in BIGINT".to_string()))?;

        let statement = format!(
            r#"
            INSERT INTO {} (
                id, notify_email, source_url, outcome_kind, detail,
                notify_sent, size_bytes, location, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
            self.table
        );

        sqlx::query(&statement)
            .bind(record.id.0)
            .bind(&record.notify_email)
            .bind(&record.source_url)
            .bind(record.outcome_kind.as_str())
            .bind(&record.detail)
            .bind(record.notify_sent)
            .bind(size_bytes)
            .bind(record.location.as_deref())
            .bind(record.timestamp)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
