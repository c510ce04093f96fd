//! Admin API endpoints
//!
//! Every route here sits behind `require_session` and `require_admin`.
//!
//! - POST /api/v1/admin/accounts - Provision an account
//! - GET /api/v1/admin/accounts - List accounts
//! - PUT /api/v1/admin/accounts/{email}/active - Suspend or reinstate
//! - PUT /api/v1/admin/accounts/{email}/admin - Grant or revoke admin
//! - DELETE /api/v1/admin/accounts/{email} - Delete an account and its pets
//! - GET /api/v1/admin/pets - Every registered pet

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedAccount};
use crate::models::{CreateAccountInput, Pet};
use crate::services::AccountSummary;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub admin: bool,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{email}", delete(delete_account))
        .route("/accounts/{email}/active", put(set_active))
        .route("/accounts/{email}/admin", put(set_admin))
        .route("/pets", get(list_pets))
}

/// POST /api/v1/admin/accounts
async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountSummary>), ApiError> {
    let account = state
        .account_service
        .create_account(CreateAccountInput {
            email: body.email,
            password: body.password,
            is_admin: body.is_admin,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AccountSummary::from(&account))))
}

/// GET /api/v1/admin/accounts
async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<AccountSummary>>, ApiError> {
    Ok(Json(state.account_service.list().await?))
}

/// PUT /api/v1/admin/accounts/{email}/active
///
/// Deactivation also ends the account's live session.
async fn set_active(
    State(state): State<AppState>,
    AuthenticatedAccount(actor): AuthenticatedAccount,
    Path(email): Path<String>,
    Json(body): Json<SetActiveRequest>,
) -> Result<StatusCode, ApiError> {
    state.guard.set_active(&actor.email, &email, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/accounts/{email}/admin
async fn set_admin(
    State(state): State<AppState>,
    AuthenticatedAccount(actor): AuthenticatedAccount,
    Path(email): Path<String>,
    Json(body): Json<SetAdminRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .account_service
        .set_admin(&actor.email, &email, body.admin)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/accounts/{email}
async fn delete_account(
    State(state): State<AppState>,
    AuthenticatedAccount(actor): AuthenticatedAccount,
    Path(email): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.account_service.delete(&actor.email, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/pets
async fn list_pets(State(state): State<AppState>) -> Result<Json<Vec<Pet>>, ApiError> {
    Ok(Json(state.pet_service.list_all().await?))
}
