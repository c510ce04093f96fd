//! Account repository
//!
//! The account lifecycle store: create, lookup by identity, and the session
//! mutators the guard relies on.
//!
//! Every mutator is a single-row `UPDATE`. The two session-slot transitions are
//! conditional so that concurrent requests for the same account cannot lose an
//! update:
//! - claiming the slot only succeeds while `session_token IS NULL`
//! - the timeout clear only succeeds while the token still equals the expiring one

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Account;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Account lifecycle store
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a new account. Fails on a duplicate identity.
    async fn create(&self, account: &Account) -> Result<Account>;

    /// Get account by identity (exact, case-sensitive match)
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// List all accounts, oldest first
    async fn list(&self) -> Result<Vec<Account>>;

    /// Count accounts
    async fn count(&self) -> Result<i64>;

    /// Physically delete an account. Returns false when it did not exist.
    async fn delete(&self, email: &str) -> Result<bool>;

    /// Store `token` as the active session token only if none is set.
    ///
    /// Returns false when the slot was already taken (or the account is gone).
    async fn set_session_token(&self, email: &str, token: &str) -> Result<bool>;

    /// Unconditionally clear the active session token
    async fn clear_session_token(&self, email: &str) -> Result<()>;

    /// Clear the active session token only if it still equals `expected`
    async fn clear_session_token_if(&self, email: &str, expected: &str) -> Result<bool>;

    /// Set the active flag. Deactivation also clears the session token in the
    /// same statement. Returns false when the account does not exist.
    async fn set_active(&self, email: &str, active: bool) -> Result<bool>;

    /// Set the administrative flag. Returns false when the account does not exist.
    async fn set_admin(&self, email: &str, admin: bool) -> Result<bool>;

    /// Replace the password hash. Returns false when the account does not exist.
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool>;
}

/// SQLx-based account repository (SQLite and MySQL)
pub struct SqlxAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxAccountRepository {
    /// Create a new SQLx account repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccountRepository> {
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
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &Account) -> Result<Account> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_account_sqlite(self.sqlite()?, account).await,
            DatabaseDriver::Mysql => create_account_mysql(self.mysql()?, account).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_account_by_email_sqlite(self.sqlite()?, email).await,
            DatabaseDriver::Mysql => get_account_by_email_mysql(self.mysql()?, email).await,
        }
    }

    async fn list(&self) -> Result<Vec<Account>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_accounts_sqlite(self.sqlite()?).await,
            DatabaseDriver::Mysql => list_accounts_mysql(self.mysql()?).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) as count FROM accounts";
        let row = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .fetch_one(self.sqlite()?)
                .await
                .map(|row| row.get::<i64, _>("count")),
            DatabaseDriver::Mysql => sqlx::query(query)
                .fetch_one(self.mysql()?)
                .await
                .map(|row| row.get::<i64, _>("count")),
        };
        row.context("Failed to count accounts")
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        let query = "DELETE FROM accounts WHERE email = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => execute_sqlite(self.sqlite()?, query, &[email]).await,
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[email]).await,
        }
        .context("Failed to delete account")?;
        Ok(affected > 0)
    }

    async fn set_session_token(&self, email: &str, token: &str) -> Result<bool> {
        let query =
            "UPDATE accounts SET session_token = ? WHERE email = ? AND session_token IS NULL";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => execute_sqlite(self.sqlite()?, query, &[token, email]).await,
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[token, email]).await,
        }
        .context("Failed to set session token")?;
        Ok(affected > 0)
    }

    async fn clear_session_token(&self, email: &str) -> Result<()> {
        let query = "UPDATE accounts SET session_token = NULL WHERE email = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => execute_sqlite(self.sqlite()?, query, &[email]).await,
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[email]).await,
        }
        .context("Failed to clear session token")?;
        Ok(())
    }

    async fn clear_session_token_if(&self, email: &str, expected: &str) -> Result<bool> {
        let query =
            "UPDATE accounts SET session_token = NULL WHERE email = ? AND session_token = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                execute_sqlite(self.sqlite()?, query, &[email, expected]).await
            }
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[email, expected]).await,
        }
        .context("Failed to clear expired session token")?;
        Ok(affected > 0)
    }

    async fn set_active(&self, email: &str, active: bool) -> Result<bool> {
        let query = if active {
            "UPDATE accounts SET is_active = 1 WHERE email = ?"
        } else {
            "UPDATE accounts SET is_active = 0, session_token = NULL WHERE email = ?"
        };
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => execute_sqlite(self.sqlite()?, query, &[email]).await,
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[email]).await,
        }
        .context("Failed to update active flag")?;
        Ok(affected > 0)
    }

    async fn set_admin(&self, email: &str, admin: bool) -> Result<bool> {
        let query = if admin {
            "UPDATE accounts SET is_admin = 1 WHERE email = ?"
        } else {
            "UPDATE accounts SET is_admin = 0 WHERE email = ?"
        };
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => execute_sqlite(self.sqlite()?, query, &[email]).await,
            DatabaseDriver::Mysql => execute_mysql(self.mysql()?, query, &[email]).await,
        }
        .context("Failed to update admin flag")?;
        Ok(affected > 0)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let query = "UPDATE accounts SET password_hash = ? WHERE email = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                execute_sqlite(self.sqlite()?, query, &[password_hash, email]).await
            }
            DatabaseDriver::Mysql => {
                execute_mysql(self.mysql()?, query, &[password_hash, email]).await
            }
        }
        .context("Failed to update password")?;
        Ok(affected > 0)
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, is_admin, is_active, session_token, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn execute_sqlite(pool: &SqlitePool, query: &str, args: &[&str]) -> sqlx::Result<u64> {
    let mut q = sqlx::query(query);
    for arg in args {
        q = q.bind(*arg);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

async fn create_account_sqlite(pool: &SqlitePool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO accounts (email, password_hash, is_admin, is_active, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_admin)
    .bind(account.is_active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: result.last_insert_rowid(),
        session_token: None,
        created_at: now,
        ..account.clone()
    })
}

async fn get_account_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE email = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by email")?;

    row.as_ref().map(row_to_account_sqlite).transpose()
}

async fn list_accounts_sqlite(pool: &SqlitePool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts ORDER BY id ASC",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list accounts")?;

    rows.iter().map(row_to_account_sqlite).collect()
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
        is_active: row.try_get("is_active")?,
        session_token: row.try_get("session_token")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn execute_mysql(pool: &MySqlPool, query: &str, args: &[&str]) -> sqlx::Result<u64> {
    let mut q = sqlx::query(query);
    for arg in args {
        q = q.bind(*arg);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

async fn create_account_mysql(pool: &MySqlPool, account: &Account) -> Result<Account> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO accounts (email, password_hash, is_admin, is_active, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(account.is_admin)
    .bind(account.is_active)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create account")?;

    Ok(Account {
        id: result.last_insert_id() as i64,
        session_token: None,
        created_at: now,
        ..account.clone()
    })
}

async fn get_account_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE email = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get account by email")?;

    row.as_ref().map(row_to_account_mysql).transpose()
}

async fn list_accounts_mysql(pool: &MySqlPool) -> Result<Vec<Account>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM accounts ORDER BY id ASC",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list accounts")?;

    rows.iter().map(row_to_account_mysql).collect()
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_admin: row.try_get("is_admin")?,
        is_active: row.try_get("is_active")?,
        session_token: row.try_get("session_token")?,
        created_at: row.try_get("created_at")?,
    })
}
