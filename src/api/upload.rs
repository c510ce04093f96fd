//! Pet photo upload
//!
//! - POST /api/v1/pets/{id}/photo - multipart/form-data, single field "file"
//!
//! Files land in the configured upload directory and are served back under
//! `/uploads/`.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use std::path::Path as FsPath;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, AuthenticatedAccount};
use crate::config::UploadConfig;
use crate::models::Pet;

/// Multipart framing allowance on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// URL prefix stored photos are served under
const UPLOADS_PREFIX: &str = "/uploads/";

/// Build the upload router
pub fn router(max_file_size: u64) -> Router<AppState> {
    let limit = usize::try_from(max_file_size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);

    Router::new()
        .route("/pets/{id}/photo", post(upload_photo))
        .layer(DefaultBodyLimit::max(limit))
}

/// POST /api/v1/pets/{id}/photo
///
/// Owner or admin only. Replaces the pet's photo URL.
async fn upload_photo(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Pet>, ApiError> {
    // Ownership first so nothing is written for a forbidden request
    let pet = state.pet_service.get(&account, &id).await?;
    let config = &state.upload_config;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::validation_error(format!(
                "Invalid file type: {}. Allowed types: {:?}",
                content_type, config.allowed_types
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(multipart_error)?;

        if data.len() as u64 > config.max_file_size {
            return Err(too_large(config.max_file_size));
        }

        ensure_upload_dir(&config.path).await?;

        let filename = format!(
            "{}-{}.{}",
            pet.id,
            Uuid::new_v4().simple(),
            config.get_extension(&content_type)
        );
        fs::write(config.path.join(&filename), &data)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

        tracing::info!(pet_id = %pet.id, file = %filename, size = data.len(), "Stored pet photo");

        let photo_url = format!("{}{}", UPLOADS_PREFIX, filename);
        let updated = match state.pet_service.set_photo(&account, &pet.id, &photo_url).await {
            Ok(updated) => updated,
            Err(e) => {
                remove_stored_photo(config, &photo_url).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = pet.photo_url.as_deref().filter(|p| *p != photo_url) {
            remove_stored_photo(config, previous).await;
        }
        return Ok(Json(updated));
    }

    Err(ApiError::validation_error("No file provided"))
}

fn too_large(max_file_size: u64) -> ApiError {
    ApiError::new(
        "PAYLOAD_TOO_LARGE",
        format!("File too large. Maximum size: {} bytes", max_file_size),
    )
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new("PAYLOAD_TOO_LARGE", e.body_text())
    } else {
        ApiError::validation_error(format!("Failed to read multipart: {}", e.body_text()))
    }
}

async fn ensure_upload_dir(path: &FsPath) -> Result<(), ApiError> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))?;
    }
    Ok(())
}

/// Delete the file behind a stored photo URL.
///
/// Only plain file names under the upload directory are touched. A missing
/// file is not an error; other failures are logged and swallowed.
pub(crate) async fn remove_stored_photo(config: &UploadConfig, photo_url: &str) {
    let Some(name) = photo_url.strip_prefix(UPLOADS_PREFIX) else {
        return;
    };
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        tracing::warn!(photo_url, "Refusing to remove photo outside the upload directory");
        return;
    }

    match fs::remove_file(config.path.join(name)).await {
        Ok(()) => tracing::debug!(file = %name, "Removed pet photo"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %name, error = %e, "Failed to remove pet photo"),
    }
}
