//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope
//! - `require_session` / `require_admin`, the request pipeline stages that run
//!   the session guard before any protected handler

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::UploadConfig;
use crate::models::{Account, ClientSession};
use crate::services::{
    AccountService, AccountServiceError, Decision, GuardError, NotificationService,
    NotifyError, PetService, PetServiceError, PresentedSession, Rejection,
    SessionCookieCodec, SessionGuard,
};

/// Login entry point rejected requests are sent back to
pub const LOGIN_PATH: &str = "/login";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<SessionGuard>,
    pub cookies: Arc<SessionCookieCodec>,
    pub account_service: Arc<AccountService>,
    pub pet_service: Arc<PetService>,
    pub notifications: Arc<NotificationService>,
    pub upload_config: Arc<UploadConfig>,
    /// Base URL encoded in pet QR codes
    pub public_url: Arc<str>,
}

/// Account that passed the session guard for this request
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Account);

/// The refreshed client session of an accepted request
#[derive(Debug, Clone)]
pub struct ActiveSession(pub ClientSession);

impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAccount>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause; the client only sees a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!(error = %cause, "Internal error");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" | "BAD_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "ACCOUNT_DISABLED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "SESSION_ALREADY_ACTIVE" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "NOTIFY_FAILED" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::BadCredentials => Self::new("BAD_CREDENTIALS", e.to_string()),
            GuardError::AccountDisabled => Self::new("ACCOUNT_DISABLED", e.to_string()),
            GuardError::SessionAlreadyActive => Self::new("SESSION_ALREADY_ACTIVE", e.to_string()),
            GuardError::InvalidOperation(msg) => Self::validation_error(msg),
            GuardError::NotFound(_) => Self::not_found(e.to_string()),
            GuardError::Internal(e) => Self::internal_error(e),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(e: AccountServiceError) -> Self {
        match e {
            AccountServiceError::ValidationError(msg) => Self::validation_error(msg),
            AccountServiceError::AccountExists(_) => Self::conflict(e.to_string()),
            AccountServiceError::NotFound(_) => Self::not_found(e.to_string()),
            AccountServiceError::AuthenticationError => {
                Self::unauthorized("Current password is incorrect")
            }
            AccountServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<PetServiceError> for ApiError {
    fn from(e: PetServiceError) -> Self {
        match e {
            PetServiceError::NotFound(_) => Self::not_found(e.to_string()),
            PetServiceError::Forbidden => Self::forbidden(e.to_string()),
            PetServiceError::ValidationError(msg) => Self::validation_error(msg),
            PetServiceError::InternalError(e) => Self::internal_error(e),
        }
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::InvalidCoordinates(msg) => Self::validation_error(msg),
            NotifyError::DeliveryFailed(_) => {
                Self::new("NOTIFY_FAILED", "Could not notify the owner")
            }
            NotifyError::Internal(e) => Self::internal_error(e),
        }
    }
}

/// Turn a guard rejection into a response.
///
/// Re-authentication cases redirect to the login entry point with a reason and
/// discard the client session; `Forbidden` is a plain 403.
pub fn rejection_response(rejection: Rejection, cookies: &SessionCookieCodec) -> Response {
    if !rejection.requires_login() {
        return ApiError::forbidden("Admin privileges required").into_response();
    }

    let location = match rejection.login_reason() {
        Some(reason) => format!("{}?reason={}", LOGIN_PATH, reason),
        None => LOGIN_PATH.to_string(),
    };

    let mut response = StatusCode::SEE_OTHER.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(header::LOCATION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&cookies.clear_cookie()) {
        headers.insert(header::SET_COOKIE, value);
    }
    response
}

/// Session guard stage for protected routes.
///
/// On accept the account and refreshed session are attached to the request and
/// the refreshed cookie is returned with the response.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = match state.cookies.read(request.headers()) {
        PresentedSession::Absent => state.guard.authorize(None).await,
        PresentedSession::Tampered => {
            tracing::info!("Rejected session cookie with a bad signature");
            Ok(Decision::Reject(Rejection::InvalidSession))
        }
        PresentedSession::Valid(session) => state.guard.authorize(Some(&session)).await,
    };

    let (account, session) = match decision {
        Ok(Decision::Accept { account, session }) => (account, session),
        Ok(Decision::Reject(rejection)) => return rejection_response(rejection, &state.cookies),
        Err(e) => return ApiError::from(e).into_response(),
    };

    request.extensions_mut().insert(AuthenticatedAccount(account));
    request.extensions_mut().insert(ActiveSession(session.clone()));

    let mut response = next.run(request).await;

    match state.cookies.set_cookie(&session) {
        Ok(cookie) => {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode session cookie"),
    }
    response
}

/// Admin stage; must run after `require_session`
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let decision = match (
        request.extensions().get::<AuthenticatedAccount>(),
        request.extensions().get::<ActiveSession>(),
    ) {
        (Some(account), Some(session)) => Decision::Accept {
            account: account.0.clone(),
            session: session.0.clone(),
        },
        _ => Decision::Reject(Rejection::NotAuthenticated),
    };

    match state.guard.elevate(decision) {
        Decision::Accept { .. } => next.run(request).await,
        Decision::Reject(rejection) => rejection_response(rejection, &state.cookies),
    }
}
