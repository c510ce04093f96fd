//! Account model
//!
//! An account is the durable record the session guard consults: credentials,
//! the single active session token, and the active/admin flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i64,
    /// Login identity (unique, case-sensitive)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Grants administrative operations
    pub is_admin: bool,
    /// Suspended accounts cannot authenticate
    pub is_active: bool,
    /// Token of the one authorized session, if any
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(email: String, password_hash: String, is_admin: bool) -> Self {
        Self {
            id: 0, // Will be set by the database
            email,
            password_hash,
            is_admin,
            is_active: true,
            session_token: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a session is currently authorized for this account
    pub fn has_active_session(&self) -> bool {
        self.session_token.is_some()
    }

    /// Whether the presented token is the stored one.
    ///
    /// A null stored token matches nothing.
    pub fn token_matches(&self, presented: &str) -> bool {
        match &self.session_token {
            Some(stored) => constant_time_eq(stored.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Input for provisioning a new account (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub is_admin: bool,
}
