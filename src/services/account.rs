//! Account service
//!
//! Provisioning and administration of accounts: creation with a hashed
//! credential, listing, admin flag changes, deletion, password changes and the
//! startup bootstrap administrator. Session state is left to the session guard.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::config::BootstrapConfig;
use crate::db::repositories::AccountRepository;
use crate::models::{Account, CreateAccountInput};
use crate::services::password::{hash_password, validate_password_policy, verify_password};

/// Error types for account service operations
#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Identity already taken
    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    /// Current password did not match
    #[error("Authentication failed")]
    AuthenticationError,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Account as shown to administrators
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: i64,
    pub email: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub has_active_session: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_admin: account.is_admin,
            is_active: account.is_active,
            has_active_session: account.has_active_session(),
            created_at: account.created_at,
        }
    }
}

/// Account administration service
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    /// Provision a new account. The credential is hashed once here.
    pub async fn create_account(
        &self,
        input: CreateAccountInput,
    ) -> Result<Account, AccountServiceError> {
        let email = input.email.trim().to_string();
        validate_email(&email)?;
        validate_password_policy(&input.password).map_err(AccountServiceError::ValidationError)?;

        if self
            .accounts
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AccountServiceError::AccountExists(email));
        }

        let password_hash = hash_password(&input.password)?;
        // A concurrent create can still win between the lookup and the insert
        let account = self
            .accounts
            .create(&Account::new(email.clone(), password_hash, input.is_admin))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AccountServiceError::AccountExists(email)
                } else {
                    AccountServiceError::InternalError(e)
                }
            })?;

        tracing::info!(email = %account.email, is_admin = account.is_admin, "Account created");
        Ok(account)
    }

    /// Get an account by identity
    pub async fn get(&self, email: &str) -> Result<Account, AccountServiceError> {
        self.accounts
            .get_by_email(email)
            .await?
            .ok_or_else(|| AccountServiceError::NotFound(email.to_string()))
    }

    /// List all accounts
    pub async fn list(&self) -> Result<Vec<AccountSummary>, AccountServiceError> {
        let accounts = self.accounts.list().await?;
        Ok(accounts.iter().map(AccountSummary::from).collect())
    }

    /// Grant or revoke the administrative flag. An admin cannot revoke their own.
    pub async fn set_admin(
        &self,
        actor: &str,
        email: &str,
        admin: bool,
    ) -> Result<(), AccountServiceError> {
        if !admin && actor == email {
            return Err(AccountServiceError::ValidationError(
                "You cannot revoke your own admin rights".to_string(),
            ));
        }

        if !self.accounts.set_admin(email, admin).await? {
            return Err(AccountServiceError::NotFound(email.to_string()));
        }
        tracing::info!(actor, email, admin, "Account admin flag changed");
        Ok(())
    }

    /// Delete an account and its pets. An admin cannot delete their own account.
    pub async fn delete(&self, actor: &str, email: &str) -> Result<(), AccountServiceError> {
        if actor == email {
            return Err(AccountServiceError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }

        if !self.accounts.delete(email).await? {
            return Err(AccountServiceError::NotFound(email.to_string()));
        }
        tracing::info!(actor, email, "Account deleted");
        Ok(())
    }

    /// Change a password after checking the current one
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountServiceError> {
        let account = self.get(email).await?;

        if !verify_password(current_password, &account.password_hash)? {
            return Err(AccountServiceError::AuthenticationError);
        }
        validate_password_policy(new_password).map_err(AccountServiceError::ValidationError)?;

        let hash = hash_password(new_password)?;
        self.accounts.update_password(email, &hash).await?;
        tracing::info!(email, "Password changed");
        Ok(())
    }

    /// Create the configured administrator when the store has no accounts yet.
    ///
    /// Returns the created account, or `None` when nothing was done.
    pub async fn bootstrap_admin(
        &self,
        config: &BootstrapConfig,
    ) -> Result<Option<Account>, AccountServiceError> {
        let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
            return Ok(None);
        };

        if self.accounts.count().await? > 0 {
            return Ok(None);
        }

        let account = self
            .create_account(CreateAccountInput {
                email: email.clone(),
                password: password.clone(),
                is_admin: true,
            })
            .await?;
        Ok(Some(account))
    }
}

/// Whether a store error is a unique-key violation, through any added context
fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

fn validate_email(email: &str) -> Result<(), AccountServiceError> {
    if email.is_empty() {
        return Err(AccountServiceError::ValidationError(
            "Email cannot be empty".to_string(),
        ));
    }
    if email.len() > 255 {
        return Err(AccountServiceError::ValidationError(
            "Email cannot exceed 255 characters".to_string(),
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AccountServiceError::ValidationError(
            "Invalid email format".to_string(),
        )),
    }
}
