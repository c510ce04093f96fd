//! Public finder endpoints (no session)
//!
//! - GET /api/v1/public/pets/{id} - Profile shown after scanning a tag
//! - GET /pet/{id} - Same profile at the short URL printed in QR codes
//! - POST /api/v1/public/report - Share the finder's location with the owner

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::{PetServiceError, PublicPetProfile, SightingReport};

/// Request body for a sighting report
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub pet_id: String,
    pub lat: f64,
    pub lng: f64,
}

/// Build the public router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pets/{id}", get(get_public_profile))
        .route("/report", post(report_sighting))
}

/// Build the short-link router mounted at the site root.
///
/// Paths match what [`qr::pet_profile_url`](crate::services::qr::pet_profile_url) encodes.
pub fn profile_router() -> Router<AppState> {
    Router::new().route("/pet/{id}", get(get_public_profile))
}

/// GET /api/v1/public/pets/{id} and GET /pet/{id}
///
/// 404 for unknown pets and for pets already marked found.
async fn get_public_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicPetProfile>, ApiError> {
    Ok(Json(state.pet_service.public_profile(&id).await?))
}

/// POST /api/v1/public/report
async fn report_sighting(
    State(state): State<AppState>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<SightingReport>, ApiError> {
    let pet = state
        .pet_service
        .lost_pet(&body.pet_id)
        .await
        .map_err(|e| match e {
            PetServiceError::NotFound(_) => ApiError::validation_error("Invalid pet"),
            other => other.into(),
        })?;

    let report = state
        .notifications
        .report_sighting(&pet, body.lat, body.lng)
        .await?;

    Ok(Json(report))
}
