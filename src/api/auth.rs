//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login - Open the account's single session
//! - POST /api/v1/auth/logout - End it (best effort, never fails)
//! - GET /api/v1/auth/me - Current account
//! - PUT /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedAccount};
use crate::services::{AccountSummary, PresentedSession};

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account: AccountSummary,
}

/// Request body for changing password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Build public auth routes (no session required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Build protected auth routes (behind the session guard)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_account))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/login
///
/// Errors: 401 BAD_CREDENTIALS, 403 ACCOUNT_DISABLED, 409 SESSION_ALREADY_ACTIVE.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (account, session) = state.guard.login(&body.email, &body.password).await?;

    let cookie = state
        .cookies
        .set_cookie(&session)
        .map_err(ApiError::internal_error)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            account: AccountSummary::from(&account),
        }),
    ))
}

/// POST /api/v1/auth/logout
///
/// Always answers 204 and expires the cookie, whatever the store says.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let PresentedSession::Valid(session) = state.cookies.read(&headers) {
        state.guard.logout(Some(&session)).await;
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&state.cookies.clear_cookie()) {
        response_headers.insert(header::SET_COOKIE, value);
    }
    (StatusCode::NO_CONTENT, response_headers)
}

/// GET /api/v1/auth/me
async fn get_current_account(AuthenticatedAccount(account): AuthenticatedAccount) -> Json<AccountSummary> {
    Json(AccountSummary::from(&account))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .account_service
        .change_password(&account.email, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
