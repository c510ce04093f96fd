//! Client session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session state held by the requester (in a signed cookie).
///
/// Only the token pointer is persisted server-side, on the account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    /// Identity claim
    pub email: String,
    /// Copy of the account's active session token
    pub token: String,
    /// Time of the last accepted authenticated request
    pub last_seen: DateTime<Utc>,
}

impl ClientSession {
    /// Create a session whose idle marker is now
    pub fn new(email: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            token: token.into(),
            last_seen: Utc::now(),
        }
    }

    /// Time elapsed since the idle marker
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }

    /// Same session with the idle marker moved to `now`
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        Self {
            last_seen: now,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_for() {
        let now = Utc::now();
        let session = ClientSession {
            email: "a@x.com".to_string(),
            token: "T1".to_string(),
            last_seen: now - Duration::seconds(1000),
        };
        assert_eq!(session.idle_for(now), Duration::seconds(1000));
    }

    #[test]
    fn test_touched_keeps_claim() {
        let session = ClientSession::new("a@x.com", "T1");
        let later = session.last_seen + Duration::seconds(30);
        let touched = session.touched(later);

        assert_eq!(touched.email, session.email);
        assert_eq!(touched.token, session.token);
        assert_eq!(touched.last_seen, later);
    }
}
