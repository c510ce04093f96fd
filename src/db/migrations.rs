//! Database migrations module
//!
//! Code-based migrations embedded as SQL strings for both SQLite and MySQL, so the
//! binary carries its own schema.
//!
//! # Usage
//!
//! ```ignore
//! use petbeacon::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All migrations, applied in order.
pub const MIGRATIONS: &[Migration] = &[
    // Identity is case-sensitive on both backends (utf8mb4_bin on MySQL).
    Migration {
        version: 1,
        name: "create_accounts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                is_admin BOOLEAN NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                session_token VARCHAR(255),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                is_admin BOOLEAN NOT NULL DEFAULT FALSE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                session_token VARCHAR(255),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_pets",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pets (
                id VARCHAR(16) PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                name VARCHAR(100) NOT NULL,
                species VARCHAR(50),
                breed VARCHAR(100),
                description TEXT,
                owner_name VARCHAR(100),
                owner_email VARCHAR(255) NOT NULL,
                owner_phone VARCHAR(32),
                photo_url VARCHAR(512),
                city VARCHAR(100),
                address VARCHAR(255),
                found BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_pets_owner_id ON pets(owner_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS pets (
                id VARCHAR(16) PRIMARY KEY,
                owner_id BIGINT NOT NULL,
                name VARCHAR(100) NOT NULL,
                species VARCHAR(50),
                breed VARCHAR(100),
                description TEXT,
                owner_name VARCHAR(100),
                owner_email VARCHAR(255) NOT NULL,
                owner_phone VARCHAR(32),
                photo_url VARCHAR(512),
                city VARCHAR(100),
                address VARCHAR(255),
                found BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_pets_owner_id ON pets(owner_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_pet_health_records",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pet_health_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pet_id VARCHAR(16) NOT NULL,
                kind VARCHAR(20) NOT NULL,
                name VARCHAR(100) NOT NULL,
                administered_on DATE NOT NULL,
                next_due_on DATE,
                notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (pet_id) REFERENCES pets(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_health_pet_id ON pet_health_records(pet_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS pet_health_records (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                pet_id VARCHAR(16) NOT NULL,
                kind VARCHAR(20) NOT NULL,
                name VARCHAR(100) NOT NULL,
                administered_on DATE NOT NULL,
                next_due_on DATE,
                notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (pet_id) REFERENCES pets(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_health_pet_id ON pet_health_records(pet_id);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied.contains(&(migration.version as i64)) {
            continue;
        }
        tracing::info!("Applying migration {}: {}", migration.version, migration.name);
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_versions(pool: &DynDatabasePool) -> Result<Vec<i64>> {
    const SQL: &str = "SELECT version FROM _migrations ORDER BY version";

    if let Some(sqlite) = pool.as_sqlite() {
        let rows = sqlx::query(SQL).fetch_all(sqlite).await?;
        return Ok(rows.iter().map(|row| row.get::<i64, _>("version")).collect());
    }
    if let Some(mysql) = pool.as_mysql() {
        let rows = sqlx::query(SQL).fetch_all(mysql).await?;
        return Ok(rows
            .iter()
            .map(|row| row.get::<i32, _>("version") as i64)
            .collect());
    }
    anyhow::bail!("Unsupported database pool")
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    if let Some(sqlite) = pool.as_sqlite() {
        return apply_migration_sqlite(sqlite, migration).await;
    }
    if let Some(mysql) = pool.as_mysql() {
        return apply_migration_mysql(mysql, migration).await;
    }
    anyhow::bail!("Unsupported database pool")
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn apply_migration_mysql(pool: &MySqlPool, migration: &Migration) -> Result<()> {
    for statement in split_sql_statements(migration.up_mysql) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual non-empty statements
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}
