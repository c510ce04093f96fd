//! API layer - HTTP handlers and routing
//!
//! Route groups:
//! - Admin endpoints (session guard + admin elevation)
//! - Owner endpoints: account, pets, health records, photos (session guard)
//! - Public endpoints: login/logout, finder profile and sighting reports
//! - QR short links at `/pet/{id}`
//! - Uploaded photos served from `/uploads`

pub mod admin;
pub mod auth;
pub mod middleware;
pub mod pets;
pub mod public;
pub mod upload;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedAccount};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes. Layers run bottom-up, so the session guard sees the
    // request before the admin check.
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    // Protected routes (need a live session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(pets::router())
        .merge(upload::router(state.upload_config.max_file_size))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/public", public::router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let upload_dir = state.upload_config.path.clone();

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(public::profile_router())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured front-end origin, with cookies allowed
fn cors_layer(cors_origin: &str) -> CorsLayer {
    let origin = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(cors_origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            return CorsLayer::new();
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true)
}

#[cfg(test)]
mod test_support;
