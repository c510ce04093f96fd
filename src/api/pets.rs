//! Pet API endpoints
//!
//! All routes sit behind the session guard. Managing a pet requires being its
//! owner or an administrator.
//!
//! - POST/GET /api/v1/pets
//! - GET/PUT/DELETE /api/v1/pets/{id}
//! - PUT /api/v1/pets/{id}/found
//! - GET /api/v1/pets/{id}/qr
//! - GET/POST /api/v1/pets/{id}/health
//! - DELETE /api/v1/pets/{id}/health/{record_id}

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedAccount};
use crate::api::upload;
use crate::models::{CreateHealthRecordInput, CreatePetInput, HealthRecord, Pet, UpdatePetInput};
use crate::services::qr;

#[derive(Debug, Deserialize)]
pub struct SetFoundRequest {
    pub found: bool,
}

/// Build the pets router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_pets).post(create_pet))
        .route("/pets/{id}", get(get_pet).put(update_pet).delete(delete_pet))
        .route("/pets/{id}/found", put(set_found))
        .route("/pets/{id}/qr", get(get_qr))
        .route("/pets/{id}/health", get(list_health).post(add_health))
        .route("/pets/{id}/health/{record_id}", delete(delete_health))
}

/// POST /api/v1/pets
async fn create_pet(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(body): Json<CreatePetInput>,
) -> Result<(StatusCode, Json<Pet>), ApiError> {
    let pet = state.pet_service.create(&account, body).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

/// GET /api/v1/pets - The caller's own pets
async fn list_pets(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<Json<Vec<Pet>>, ApiError> {
    Ok(Json(state.pet_service.list_for(&account).await?))
}

/// GET /api/v1/pets/{id}
async fn get_pet(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
) -> Result<Json<Pet>, ApiError> {
    Ok(Json(state.pet_service.get(&account, &id).await?))
}

/// PUT /api/v1/pets/{id}
async fn update_pet(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
    Json(body): Json<UpdatePetInput>,
) -> Result<Json<Pet>, ApiError> {
    Ok(Json(state.pet_service.update(&account, &id, body).await?))
}

/// DELETE /api/v1/pets/{id}
async fn delete_pet(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let pet = state.pet_service.delete(&account, &id).await?;
    if let Some(photo_url) = pet.photo_url {
        upload::remove_stored_photo(&state.upload_config, &photo_url).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/pets/{id}/found
async fn set_found(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
    Json(body): Json<SetFoundRequest>,
) -> Result<Json<Pet>, ApiError> {
    Ok(Json(
        state.pet_service.set_found(&account, &id, body.found).await?,
    ))
}

/// GET /api/v1/pets/{id}/qr - SVG QR code pointing at the public profile
async fn get_qr(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pet = state.pet_service.get(&account, &id).await?;
    let url = qr::pet_profile_url(&state.public_url, &pet.id);
    let svg = qr::render_svg(&url).map_err(ApiError::internal_error)?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// GET /api/v1/pets/{id}/health
async fn list_health(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
) -> Result<Json<Vec<HealthRecord>>, ApiError> {
    Ok(Json(state.pet_service.list_health(&account, &id).await?))
}

/// POST /api/v1/pets/{id}/health
async fn add_health(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
    Json(body): Json<CreateHealthRecordInput>,
) -> Result<(StatusCode, Json<HealthRecord>), ApiError> {
    let record = state.pet_service.add_health(&account, &id, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/v1/pets/{id}/health/{record_id}
async fn delete_health(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path((id, record_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .pet_service
        .delete_health(&account, &id, record_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
