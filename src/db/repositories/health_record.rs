//! Health record repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateHealthRecordInput, HealthRecord, HealthRecordKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Health record store
#[async_trait]
pub trait HealthRecordRepository: Send + Sync {
    /// Add a record to a pet
    async fn create(&self, pet_id: &str, input: &CreateHealthRecordInput) -> Result<HealthRecord>;

    /// List a pet's records, most recently administered first
    async fn list_by_pet(&self, pet_id: &str) -> Result<Vec<HealthRecord>>;

    /// Delete one of a pet's records. Returns false when no such record exists.
    async fn delete(&self, pet_id: &str, record_id: i64) -> Result<bool>;
}

/// SQLx-based health record repository (SQLite and MySQL)
pub struct SqlxHealthRecordRepository {
    pool: DynDatabasePool,
}

impl SqlxHealthRecordRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HealthRecordRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool not available")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool not available")
    }
}

#[async_trait]
impl HealthRecordRepository for SqlxHealthRecordRepository {
    async fn create(&self, pet_id: &str, input: &CreateHealthRecordInput) -> Result<HealthRecord> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_record_sqlite(self.sqlite()?, pet_id, input, now).await?
            }
            DatabaseDriver::Mysql => create_record_mysql(self.mysql()?, pet_id, input, now).await?,
        };

        Ok(HealthRecord {
            id,
            pet_id: pet_id.to_string(),
            kind: input.kind,
            name: input.name.clone(),
            administered_on: input.administered_on,
            next_due_on: input.next_due_on,
            notes: input.notes.clone(),
            created_at: now,
        })
    }

    async fn list_by_pet(&self, pet_id: &str) -> Result<Vec<HealthRecord>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_records_sqlite(self.sqlite()?, pet_id).await,
            DatabaseDriver::Mysql => list_records_mysql(self.mysql()?, pet_id).await,
        }
    }

    async fn delete(&self, pet_id: &str, record_id: i64) -> Result<bool> {
        let query = "DELETE FROM pet_health_records WHERE id = ? AND pet_id = ?";
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(record_id)
                .bind(pet_id)
                .execute(self.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(record_id)
                .bind(pet_id)
                .execute(self.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        };
        Ok(result.context("Failed to delete health record")? > 0)
    }
}

const INSERT_RECORD: &str = r#"
    INSERT INTO pet_health_records
        (pet_id, kind, name, administered_on, next_due_on, notes, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_RECORDS: &str = r#"
    SELECT id, pet_id, kind, name, administered_on, next_due_on, notes, created_at
    FROM pet_health_records
    WHERE pet_id = ?
    ORDER BY administered_on DESC, id DESC
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_record_sqlite(
    pool: &SqlitePool,
    pet_id: &str,
    input: &CreateHealthRecordInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(INSERT_RECORD)
        .bind(pet_id)
        .bind(input.kind.to_string())
        .bind(&input.name)
        .bind(input.administered_on)
        .bind(input.next_due_on)
        .bind(&input.notes)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create health record")?;

    Ok(result.last_insert_rowid())
}

async fn list_records_sqlite(pool: &SqlitePool, pet_id: &str) -> Result<Vec<HealthRecord>> {
    let rows = sqlx::query(SELECT_RECORDS)
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .context("Failed to list health records")?;

    rows.iter().map(row_to_record_sqlite).collect()
}

fn row_to_record_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<HealthRecord> {
    let kind_str: String = row.try_get("kind")?;
    let kind = HealthRecordKind::from_str(&kind_str).map_err(anyhow::Error::msg)?;

    Ok(HealthRecord {
        id: row.try_get("id")?,
        pet_id: row.try_get("pet_id")?,
        kind,
        name: row.try_get("name")?,
        administered_on: row.try_get("administered_on")?,
        next_due_on: row.try_get("next_due_on")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_record_mysql(
    pool: &MySqlPool,
    pet_id: &str,
    input: &CreateHealthRecordInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(INSERT_RECORD)
        .bind(pet_id)
        .bind(input.kind.to_string())
        .bind(&input.name)
        .bind(input.administered_on)
        .bind(input.next_due_on)
        .bind(&input.notes)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create health record")?;

    Ok(result.last_insert_id() as i64)
}

async fn list_records_mysql(pool: &MySqlPool, pet_id: &str) -> Result<Vec<HealthRecord>> {
    let rows = sqlx::query(SELECT_RECORDS)
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .context("Failed to list health records")?;

    rows.iter().map(row_to_record_mysql).collect()
}

fn row_to_record_mysql(row: &sqlx::mysql::MySqlRow) -> Result<HealthRecord> {
    let kind_str: String = row.try_get("kind")?;
    let kind = HealthRecordKind::from_str(&kind_str).map_err(anyhow::Error::msg)?;

    Ok(HealthRecord {
        id: row.try_get("id")?,
        pet_id: row.try_get("pet_id")?,
        kind,
        name: row.try_get("name")?,
        administered_on: row.try_get("administered_on")?,
        next_due_on: row.try_get("next_due_on")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}
