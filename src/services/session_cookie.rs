//! Signed session cookie
//!
//! The client session travels as `<payload>.<signature>` where the payload is the
//! base64url-encoded JSON of [`ClientSession`] and the signature is an
//! HMAC-SHA256 over the encoded payload. A cookie that fails verification is
//! never trusted, not even for its identity claim.

use anyhow::Result;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use axum::http::{header, HeaderMap};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::SessionConfig;
use crate::models::ClientSession;

type HmacSha256 = Hmac<Sha256>;

/// What the request carried in the session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentedSession {
    /// No session cookie
    Absent,
    /// A cookie was sent but is not a session we issued
    Tampered,
    /// A verified client session
    Valid(ClientSession),
}

/// Encodes, signs and verifies the client session cookie
#[derive(Clone)]
pub struct SessionCookieCodec {
    key: Vec<u8>,
    cookie_name: String,
    secure: bool,
}

impl SessionCookieCodec {
    /// Build a codec from the session configuration.
    ///
    /// An empty `secret_key` gets a random per-process key, so sessions do not
    /// survive a restart.
    pub fn from_config(config: &SessionConfig) -> Self {
        let key = if config.secret_key.is_empty() {
            tracing::warn!("session.secret_key is not set; using a random key for this process");
            let mut key = vec![0u8; 32];
            OsRng.fill_bytes(&mut key);
            key
        } else {
            config.secret_key.as_bytes().to_vec()
        };

        Self {
            key,
            cookie_name: config.cookie_name.clone(),
            secure: config.secure_cookie,
        }
    }

    /// Name of the session cookie
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| anyhow::anyhow!("Invalid session signing key: {}", e))
    }

    /// Serialize and sign a client session
    pub fn encode(&self, session: &ClientSession) -> Result<String> {
        let payload = BASE64URL_NOPAD.encode(&serde_json::to_vec(session)?);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = BASE64URL_NOPAD.encode(&mac.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify and deserialize a cookie value. `None` when it is not ours.
    pub fn decode(&self, value: &str) -> Option<ClientSession> {
        let (payload, signature) = value.split_once('.')?;
        let signature = BASE64URL_NOPAD.decode(signature.as_bytes()).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = BASE64URL_NOPAD.decode(payload.as_bytes()).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Read the session cookie from request headers
    pub fn read(&self, headers: &HeaderMap) -> PresentedSession {
        let prefix = format!("{}=", self.cookie_name);

        let value = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|h| h.split(';'))
            .map(str::trim)
            .find_map(|cookie| cookie.strip_prefix(prefix.as_str()));

        match value {
            None | Some("") => PresentedSession::Absent,
            Some(value) => match self.decode(value) {
                Some(session) => PresentedSession::Valid(session),
                None => PresentedSession::Tampered,
            },
        }
    }

    /// `Set-Cookie` value carrying the session
    pub fn set_cookie(&self, session: &ClientSession) -> Result<String> {
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
            self.cookie_name,
            self.encode(session)?,
            self.secure_attr()
        ))
    }

    /// `Set-Cookie` value that discards the session on the client
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.cookie_name,
            self.secure_attr()
        )
    }

    fn secure_attr(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }
}
