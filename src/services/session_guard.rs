//! Session guard
//!
//! Decides for every protected request whether the caller is currently
//! authorized, and keeps the client's idle marker fresh.
//!
//! Single-session policy: an account holds at most one active session token.
//! `login` claims the slot with a conditional update and reports
//! `SessionAlreadyActive` when it is taken; only `logout`, an idle timeout or
//! deactivation free it again.
//!
//! `authorize` checks, in order:
//! 1. a session was presented, else `NotAuthenticated`
//! 2. the claimed account exists, else `InvalidSession`
//! 3. the account is active, else `AccountDisabled` (before the token check,
//!    so a suspended user sees the real cause)
//! 4. the presented token equals the stored one, else `InvalidSession`
//! 5. the idle marker is within the timeout, else `Timeout` and the stored
//!    token is cleared if it is still the expiring one
//!
//! Store failures in `authorize` and `login` surface as [`GuardError::Internal`]
//! and never grant access. `logout` swallows them.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

use crate::config::{SessionConfig, MAX_IDLE_TIMEOUT_SECONDS};
use crate::db::repositories::AccountRepository;
use crate::models::{Account, ClientSession};
use crate::services::password::verify_password_or_dummy;
use crate::services::token::generate_session_token;

/// Why a request was not allowed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No session presented
    NotAuthenticated,
    /// Unknown identity, mismatched or stale token
    InvalidSession,
    /// Account suspended by an administrator
    AccountDisabled,
    /// Idle for longer than the configured timeout
    Timeout,
    /// Authenticated but not an administrator. Not a re-authentication prompt.
    Forbidden,
}

impl Rejection {
    /// Error code used in API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::NotAuthenticated => "NOT_AUTHENTICATED",
            Rejection::InvalidSession => "INVALID_SESSION",
            Rejection::AccountDisabled => "ACCOUNT_DISABLED",
            Rejection::Timeout => "TIMEOUT",
            Rejection::Forbidden => "FORBIDDEN",
        }
    }

    /// `reason` query value for the login redirect, if any
    pub fn login_reason(&self) -> Option<&'static str> {
        match self {
            Rejection::InvalidSession => Some("invalid_session"),
            Rejection::AccountDisabled => Some("account_disabled"),
            Rejection::Timeout => Some("timeout"),
            Rejection::NotAuthenticated | Rejection::Forbidden => None,
        }
    }

    /// Whether the client should be sent back to the login entry point
    pub fn requires_login(&self) -> bool {
        !matches!(self, Rejection::Forbidden)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of a guard check
#[derive(Debug, Clone)]
pub enum Decision {
    /// Caller is authorized; `session` carries the refreshed idle marker
    Accept {
        account: Account,
        session: ClientSession,
    },
    Reject(Rejection),
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept { .. })
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Decision::Accept { .. } => None,
            Decision::Reject(rejection) => Some(*rejection),
        }
    }
}

/// Errors from guard operations that are not authorization decisions
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Unknown identity or wrong secret (indistinguishable on purpose)
    #[error("Invalid email or password")]
    BadCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    /// The account already has a live session elsewhere
    #[error("A session is already active for this account")]
    SessionAlreadyActive,

    /// Requested operation is not allowed (e.g. self-deactivation)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// The session guard
pub struct SessionGuard {
    accounts: Arc<dyn AccountRepository>,
    idle_timeout: Duration,
    token_bytes: usize,
}

impl SessionGuard {
    pub fn new(accounts: Arc<dyn AccountRepository>, config: &SessionConfig) -> Self {
        Self {
            accounts,
            // Clamped so an unvalidated config can neither overflow nor wrap negative
            idle_timeout: Duration::seconds(
                config.idle_timeout_seconds.min(MAX_IDLE_TIMEOUT_SECONDS) as i64,
            ),
            token_bytes: config.token_bytes,
        }
    }

    /// Configured idle timeout
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Check a presented session against the store
    pub async fn authorize(&self, presented: Option<&ClientSession>) -> Result<Decision, GuardError> {
        self.authorize_at(presented, Utc::now()).await
    }

    /// [`authorize`](Self::authorize) with an explicit clock
    pub async fn authorize_at(
        &self,
        presented: Option<&ClientSession>,
        now: DateTime<Utc>,
    ) -> Result<Decision, GuardError> {
        let Some(session) = presented else {
            return Ok(Decision::Reject(Rejection::NotAuthenticated));
        };

        let Some(account) = self.accounts.get_by_email(&session.email).await? else {
            tracing::info!(email = %session.email, "Rejected session for unknown account");
            return Ok(Decision::Reject(Rejection::InvalidSession));
        };

        if !account.is_active {
            tracing::info!(email = %account.email, "Rejected session for disabled account");
            return Ok(Decision::Reject(Rejection::AccountDisabled));
        }

        if !account.token_matches(&session.token) {
            tracing::info!(email = %account.email, "Rejected stale or mismatched session token");
            return Ok(Decision::Reject(Rejection::InvalidSession));
        }

        if session.idle_for(now) > self.idle_timeout {
            let cleared = self
                .accounts
                .clear_session_token_if(&account.email, &session.token)
                .await?;
            tracing::info!(email = %account.email, cleared, "Session timed out");
            return Ok(Decision::Reject(Rejection::Timeout));
        }

        Ok(Decision::Accept {
            session: session.touched(now),
            account,
        })
    }

    /// Additionally require the administrative flag on an accepted decision
    pub fn elevate(&self, decision: Decision) -> Decision {
        match decision {
            Decision::Accept { ref account, .. } if !account.is_admin => {
                tracing::info!(email = %account.email, "Rejected non-admin for admin operation");
                Decision::Reject(Rejection::Forbidden)
            }
            other => other,
        }
    }

    /// Verify credentials and open the account's single session
    pub async fn login(&self, email: &str, password: &str) -> Result<(Account, ClientSession), GuardError> {
        self.login_at(email, password, Utc::now()).await
    }

    /// [`login`](Self::login) with an explicit clock
    pub async fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<(Account, ClientSession), GuardError> {
        let account = self.accounts.get_by_email(email).await?;

        // Unknown identities still pay for a full verification
        let verified = verify_password_or_dummy(
            password,
            account.as_ref().map(|a| a.password_hash.as_str()),
        )?;

        let mut account = match account {
            Some(account) if verified => account,
            Some(_) => {
                tracing::info!(email, "Login failed: wrong password");
                return Err(GuardError::BadCredentials);
            }
            None => {
                tracing::info!(email, "Login failed: unknown account");
                return Err(GuardError::BadCredentials);
            }
        };

        if !account.is_active {
            tracing::info!(email, "Login refused: account disabled");
            return Err(GuardError::AccountDisabled);
        }

        let token = generate_session_token(self.token_bytes);
        if !self.accounts.set_session_token(email, &token).await? {
            tracing::info!(email, "Login refused: session already active");
            return Err(GuardError::SessionAlreadyActive);
        }

        tracing::info!(email, "Login succeeded");
        account.session_token = Some(token.clone());
        let session = ClientSession {
            email: account.email.clone(),
            token,
            last_seen: now,
        };
        Ok((account, session))
    }

    /// End the session server-side. Never fails from the caller's point of view.
    pub async fn logout(&self, presented: Option<&ClientSession>) {
        let Some(session) = presented else {
            return;
        };

        match self.accounts.clear_session_token(&session.email).await {
            Ok(()) => tracing::info!(email = %session.email, "Logged out"),
            Err(e) => tracing::warn!(
                email = %session.email,
                error = %e,
                "Failed to clear session token on logout"
            ),
        }
    }

    /// Suspend or reinstate an account on behalf of `actor`.
    ///
    /// Deactivation also ends any live session. An administrator cannot
    /// deactivate their own account.
    pub async fn set_active(&self, actor: &str, email: &str, active: bool) -> Result<(), GuardError> {
        if !active && actor == email {
            return Err(GuardError::InvalidOperation(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        if !self.accounts.set_active(email, active).await? {
            return Err(GuardError::NotFound(email.to_string()));
        }

        tracing::info!(actor, email, active, "Account active flag changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxAccountRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::password::hash_password;
    use anyhow::anyhow;
    use async_trait::async_trait;

    const PASSWORD: &str = "correct horse";

    async fn setup_repo() -> Arc<dyn AccountRepository> {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxAccountRepository::boxed(pool)
    }

    fn guard(repo: Arc<dyn AccountRepository>) -> SessionGuard {
        SessionGuard::new(repo, &SessionConfig::default())
    }

    /// Account with a fake hash for tests that never log in
    async fn seed(repo: &Arc<dyn AccountRepository>, email: &str, token: Option<&str>) {
        repo.create(&Account::new(email.to_string(), "hash".to_string(), false))
            .await
            .unwrap();
        if let Some(token) = token {
            assert!(repo.set_session_token(email, token).await.unwrap());
        }
    }

    async fn seed_with_password(repo: &Arc<dyn AccountRepository>, email: &str, admin: bool) {
        let hash = hash_password(PASSWORD).unwrap();
        repo.create(&Account::new(email.to_string(), hash, admin))
            .await
            .unwrap();
    }

    async fn stored_token(repo: &Arc<dyn AccountRepository>, email: &str) -> Option<String> {
        repo.get_by_email(email).await.unwrap().unwrap().session_token
    }

    fn session_idle(email: &str, token: &str, now: DateTime<Utc>, idle_secs: i64) -> ClientSession {
        ClientSession {
            email: email.to_string(),
            token: token.to_string(),
            last_seen: now - Duration::seconds(idle_secs),
        }
    }

    /// Store that is always unreachable
    struct UnreachableStore;

    #[async_trait]
    impl AccountRepository for UnreachableStore {
        async fn create(&self, _: &Account) -> anyhow::Result<Account> {
            Err(anyhow!("store unreachable"))
        }
        async fn get_by_email(&self, _: &str) -> anyhow::Result<Option<Account>> {
            Err(anyhow!("store unreachable"))
        }
        async fn list(&self) -> anyhow::Result<Vec<Account>> {
            Err(anyhow!("store unreachable"))
        }
        async fn count(&self) -> anyhow::Result<i64> {
            Err(anyhow!("store unreachable"))
        }
        async fn delete(&self, _: &str) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
        async fn set_session_token(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
        async fn clear_session_token(&self, _: &str) -> anyhow::Result<()> {
            Err(anyhow!("store unreachable"))
        }
        async fn clear_session_token_if(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
        async fn set_active(&self, _: &str, _: bool) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
        async fn set_admin(&self, _: &str, _: bool) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
        async fn update_password(&self, _: &str, _: &str) -> anyhow::Result<bool> {
            Err(anyhow!("store unreachable"))
        }
    }

    #[tokio::test]
    async fn test_no_session_is_not_authenticated() {
        let guard = guard(setup_repo().await);
        let decision = guard.authorize(None).await.unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_unknown_identity_is_invalid_session() {
        let guard = guard(setup_repo().await);
        let session = ClientSession::new("ghost@x.com", "T1");

        let decision = guard.authorize(Some(&session)).await.unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::InvalidSession));
    }

    #[tokio::test]
    async fn test_null_stored_token_is_invalid_session() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", None).await;
        let guard = guard(repo);

        let decision = guard
            .authorize(Some(&ClientSession::new("a@x.com", "T1")))
            .await
            .unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::InvalidSession));
    }

    #[tokio::test]
    async fn test_accept_refreshes_idle_marker() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        let guard = guard(repo.clone());
        let now = Utc::now();

        let session = session_idle("a@x.com", "T1", now, 300);
        let decision = guard.authorize_at(Some(&session), now).await.unwrap();

        let Decision::Accept { account, session: refreshed } = decision else {
            panic!("expected accept");
        };
        assert_eq!(account.email, "a@x.com");
        assert_eq!(refreshed.last_seen, now);
        assert_eq!(refreshed.token, "T1");

        // The refreshed session keeps passing later on
        let later = now + Duration::seconds(600);
        let again = guard.authorize_at(Some(&refreshed), later).await.unwrap();
        assert!(again.is_accept());
        assert_eq!(stored_token(&repo, "a@x.com").await.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_exactly_at_timeout_is_accepted() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        let guard = guard(repo);
        let now = Utc::now();

        let session = session_idle("a@x.com", "T1", now, 900);
        assert!(guard.authorize_at(Some(&session), now).await.unwrap().is_accept());
    }

    #[tokio::test]
    async fn test_timeout_clears_stored_token() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        let guard = guard(repo.clone());
        let now = Utc::now();

        let session = session_idle("a@x.com", "T1", now, 1000);
        let decision = guard.authorize_at(Some(&session), now).await.unwrap();

        assert_eq!(decision.rejection(), Some(Rejection::Timeout));
        assert!(stored_token(&repo, "a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_does_not_clear_newer_token() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        let guard = guard(repo.clone());
        let now = Utc::now();

        // The expiring T1 is replaced by T2 before the clear lands
        repo.clear_session_token("a@x.com").await.unwrap();
        repo.set_session_token("a@x.com", "T2").await.unwrap();
        assert!(!repo.clear_session_token_if("a@x.com", "T1").await.unwrap());

        let stale = session_idle("a@x.com", "T1", now, 1000);
        let decision = guard.authorize_at(Some(&stale), now).await.unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::InvalidSession));
        assert_eq!(stored_token(&repo, "a@x.com").await.as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_disabled_takes_precedence_over_stale_token() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        seed(&repo, "admin@x.com", None).await;
        let guard = guard(repo.clone());

        guard.set_active("admin@x.com", "a@x.com", false).await.unwrap();
        assert!(stored_token(&repo, "a@x.com").await.is_none());

        let decision = guard
            .authorize(Some(&ClientSession::new("a@x.com", "T1")))
            .await
            .unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::AccountDisabled));
    }

    #[tokio::test]
    async fn test_self_deactivation_rejected() {
        let repo = setup_repo().await;
        seed(&repo, "admin@x.com", Some("T1")).await;
        let guard = guard(repo.clone());

        let result = guard.set_active("admin@x.com", "admin@x.com", false).await;
        assert!(matches!(result, Err(GuardError::InvalidOperation(_))));

        let account = repo.get_by_email("admin@x.com").await.unwrap().unwrap();
        assert!(account.is_active);
        assert_eq!(account.session_token.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_set_active_unknown_account() {
        let guard = guard(setup_repo().await);
        let result = guard.set_active("admin@x.com", "ghost@x.com", false).await;
        assert!(matches!(result, Err(GuardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reactivation_allows_login_again() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo);

        guard.set_active("admin@x.com", "a@x.com", false).await.unwrap();
        assert!(matches!(
            guard.login("a@x.com", PASSWORD).await,
            Err(GuardError::AccountDisabled)
        ));

        guard.set_active("admin@x.com", "a@x.com", true).await.unwrap();
        assert!(guard.login("a@x.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_elevate() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        repo.create(&Account::new("admin@x.com".to_string(), "hash".to_string(), true))
            .await
            .unwrap();
        repo.set_session_token("admin@x.com", "T2").await.unwrap();
        let guard = guard(repo);

        let user = guard
            .authorize(Some(&ClientSession::new("a@x.com", "T1")))
            .await
            .unwrap();
        assert_eq!(guard.elevate(user).rejection(), Some(Rejection::Forbidden));

        let admin = guard
            .authorize(Some(&ClientSession::new("admin@x.com", "T2")))
            .await
            .unwrap();
        assert!(guard.elevate(admin).is_accept());

        // Earlier rejections pass through unchanged
        let rejected = Decision::Reject(Rejection::Timeout);
        assert_eq!(guard.elevate(rejected).rejection(), Some(Rejection::Timeout));
    }

    #[tokio::test]
    async fn test_login_then_second_login_is_refused() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo.clone());

        let (_, session) = guard.login("a@x.com", PASSWORD).await.unwrap();
        let t1 = session.token.clone();
        assert_eq!(t1.len(), SessionConfig::default().token_bytes * 2);
        assert_eq!(stored_token(&repo, "a@x.com").await, Some(t1.clone()));

        let second = guard.login("a@x.com", PASSWORD).await;
        assert!(matches!(second, Err(GuardError::SessionAlreadyActive)));
        assert_eq!(stored_token(&repo, "a@x.com").await, Some(t1));
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo.clone());

        let wrong = guard.login("a@x.com", "wrong password").await;
        let unknown = guard.login("b@x.com", PASSWORD).await;
        let wrong_case = guard.login("A@x.com", PASSWORD).await;

        assert!(matches!(wrong, Err(GuardError::BadCredentials)));
        assert!(matches!(unknown, Err(GuardError::BadCredentials)));
        assert!(matches!(wrong_case, Err(GuardError::BadCredentials)));
        assert!(stored_token(&repo, "a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_identity_costs_a_full_verification() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo);
        // Keep the one-off dummy hash out of the measurement
        crate::services::password::dummy_hash().unwrap();

        let mut wrong_password = std::time::Duration::ZERO;
        let mut unknown_identity = std::time::Duration::ZERO;
        for _ in 0..3 {
            let started = std::time::Instant::now();
            let result = guard.login("a@x.com", "wrong password").await;
            wrong_password += started.elapsed();
            assert!(matches!(result, Err(GuardError::BadCredentials)));

            let started = std::time::Instant::now();
            let result = guard.login("ghost@x.com", "wrong password").await;
            unknown_identity += started.elapsed();
            assert!(matches!(result, Err(GuardError::BadCredentials)));
        }

        assert!(
            unknown_identity * 4 >= wrong_password,
            "unknown identity answered in {:?}, wrong password in {:?}",
            unknown_identity,
            wrong_password
        );
    }

    #[tokio::test]
    async fn test_oversized_idle_timeout_is_clamped() {
        let repo = setup_repo().await;
        seed(&repo, "a@x.com", Some("T1")).await;
        let config = SessionConfig {
            idle_timeout_seconds: u64::MAX,
            ..SessionConfig::default()
        };
        let guard = SessionGuard::new(repo.clone(), &config);
        assert_eq!(
            guard.idle_timeout(),
            Duration::seconds(MAX_IDLE_TIMEOUT_SECONDS as i64)
        );

        let fresh = ClientSession::new("a@x.com", "T1");
        assert!(guard.authorize(Some(&fresh)).await.unwrap().is_accept());
        assert_eq!(stored_token(&repo, "a@x.com").await.as_deref(), Some("T1"));

        let huge = SessionConfig {
            idle_timeout_seconds: 100_000_000_000_000_000,
            ..SessionConfig::default()
        };
        let guard = SessionGuard::new(repo, &huge);
        assert!(guard.authorize(Some(&fresh)).await.unwrap().is_accept());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo.clone());

        let (_, session) = guard.login("a@x.com", PASSWORD).await.unwrap();
        guard.logout(Some(&session)).await;
        assert!(stored_token(&repo, "a@x.com").await.is_none());
        guard.logout(Some(&session)).await;
        assert!(stored_token(&repo, "a@x.com").await.is_none());
        guard.logout(None).await;

        // Slot is free again
        assert!(guard.login("a@x.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_logged_out_session_is_invalid() {
        let repo = setup_repo().await;
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = guard(repo);

        let (_, session) = guard.login("a@x.com", PASSWORD).await.unwrap();
        guard.logout(Some(&session)).await;

        let decision = guard.authorize(Some(&session)).await.unwrap();
        assert_eq!(decision.rejection(), Some(Rejection::InvalidSession));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_closed() {
        let guard = guard(Arc::new(UnreachableStore));
        let session = ClientSession::new("a@x.com", "T1");

        assert!(matches!(
            guard.authorize(Some(&session)).await,
            Err(GuardError::Internal(_))
        ));
        assert!(matches!(
            guard.login("a@x.com", PASSWORD).await,
            Err(GuardError::Internal(_))
        ));
        // Nothing to look up without a session
        assert!(guard.authorize(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_swallows_store_failure() {
        let guard = guard(Arc::new(UnreachableStore));
        guard.logout(Some(&ClientSession::new("a@x.com", "T1"))).await;
    }

    #[tokio::test]
    async fn test_concurrent_logins_claim_one_slot() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let repo = SqlxAccountRepository::boxed(pool);
        seed_with_password(&repo, "a@x.com", false).await;
        let guard = Arc::new(guard(repo));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guard = guard.clone();
                tokio::spawn(async move { guard.login("a@x.com", PASSWORD).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(GuardError::SessionAlreadyActive) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(Rejection::Timeout.login_reason(), Some("timeout"));
        assert_eq!(Rejection::InvalidSession.login_reason(), Some("invalid_session"));
        assert_eq!(Rejection::AccountDisabled.login_reason(), Some("account_disabled"));
        assert_eq!(Rejection::NotAuthenticated.login_reason(), None);
        assert!(!Rejection::Forbidden.requires_login());
        assert!(Rejection::NotAuthenticated.requires_login());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Any token other than the stored one is rejected, stored token untouched
            #[test]
            fn mismatched_token_is_invalid_session(
                stored in proptest::option::of("[0-9a-f]{64}"),
                presented in "[0-9a-f]{64}",
            ) {
                prop_assume!(stored.as_deref() != Some(presented.as_str()));

                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let repo = setup_repo().await;
                    seed(&repo, "a@x.com", stored.as_deref()).await;
                    let guard = guard(repo.clone());

                    let session = ClientSession::new("a@x.com", presented.clone());
                    let decision = guard.authorize(Some(&session)).await.unwrap();

                    prop_assert_eq!(decision.rejection(), Some(Rejection::InvalidSession));
                    prop_assert_eq!(stored_token(&repo, "a@x.com").await, stored.clone());
                    Ok(())
                });
                result?;
            }

            /// Idle beyond the threshold times out and clears the stored token
            #[test]
            fn idle_beyond_timeout_clears_token(idle in 901i64..1_000_000) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let repo = setup_repo().await;
                    seed(&repo, "a@x.com", Some("T1")).await;
                    let guard = guard(repo.clone());
                    let now = Utc::now();

                    let session = session_idle("a@x.com", "T1", now, idle);
                    let decision = guard.authorize_at(Some(&session), now).await.unwrap();

                    prop_assert_eq!(decision.rejection(), Some(Rejection::Timeout));
                    prop_assert!(stored_token(&repo, "a@x.com").await.is_none());
                    Ok(())
                });
                result?;
            }

            /// Idle within the threshold accepts and moves the marker to now
            #[test]
            fn idle_within_timeout_accepts(idle in 0i64..=900) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let repo = setup_repo().await;
                    seed(&repo, "a@x.com", Some("T1")).await;
                    let guard = guard(repo.clone());
                    let now = Utc::now();

                    let session = session_idle("a@x.com", "T1", now, idle);
                    match guard.authorize_at(Some(&session), now).await.unwrap() {
                        Decision::Accept { session, .. } => prop_assert_eq!(session.last_seen, now),
                        Decision::Reject(r) => prop_assert!(false, "unexpected rejection {}", r),
                    }
                    let stored = stored_token(&repo, "a@x.com").await;
                    prop_assert_eq!(stored.as_deref(), Some("T1"));
                    Ok(())
                });
                result?;
            }

            /// A custom timeout is honoured on both sides of the boundary
            #[test]
            fn configured_timeout_is_the_boundary(timeout in 1u64..10_000) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let repo = setup_repo().await;
                    seed(&repo, "a@x.com", Some("T1")).await;
                    let config = SessionConfig {
                        idle_timeout_seconds: timeout,
                        ..SessionConfig::default()
                    };
                    let guard = SessionGuard::new(repo, &config);
                    let now = Utc::now();

                    let fresh = session_idle("a@x.com", "T1", now, timeout as i64);
                    prop_assert!(guard.authorize_at(Some(&fresh), now).await.unwrap().is_accept());

                    let stale = session_idle("a@x.com", "T1", now, timeout as i64 + 1);
                    let decision = guard.authorize_at(Some(&stale), now).await.unwrap();
                    prop_assert_eq!(decision.rejection(), Some(Rejection::Timeout));
                    Ok(())
                });
                result?;
            }
        }
    }
}
