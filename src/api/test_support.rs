//! Shared fixtures for router tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::config::{SessionConfig, UploadConfig};
use crate::db::repositories::{SqlxAccountRepository, SqlxHealthRecordRepository, SqlxPetRepository};
use crate::db::{create_test_pool, migrations::run_migrations};
use crate::models::CreateAccountInput;
use crate::services::{
    AccountService, NotificationService, PetService, SessionCookieCodec, SessionGuard,
};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const OWNER_EMAIL: &str = "owner@example.com";
pub const PASSWORD: &str = "correct-horse";

/// App state over a fresh in-memory store with one admin and one owner
pub async fn test_state() -> AppState {
    test_state_with_uploads(UploadConfig::default()).await
}

pub async fn test_state_with_uploads(upload_config: UploadConfig) -> AppState {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    run_migrations(&pool).await.expect("Failed to run migrations");

    let session_config = SessionConfig {
        secret_key: "router-test-secret".to_string(),
        ..Default::default()
    };

    let accounts = SqlxAccountRepository::boxed(pool.clone());
    let account_service = Arc::new(AccountService::new(accounts.clone()));
    for (email, is_admin) in [(ADMIN_EMAIL, true), (OWNER_EMAIL, false)] {
        create_account(&account_service, email, is_admin).await;
    }

    AppState {
        guard: Arc::new(SessionGuard::new(accounts, &session_config)),
        cookies: Arc::new(SessionCookieCodec::from_config(&session_config)),
        account_service,
        pet_service: Arc::new(PetService::new(
            SqlxPetRepository::boxed(pool.clone()),
            SqlxHealthRecordRepository::boxed(pool),
        )),
        notifications: Arc::new(NotificationService::new(None)),
        upload_config: Arc::new(upload_config),
        public_url: Arc::from("https://petbeacon.test"),
    }
}

pub async fn create_account(service: &AccountService, email: &str, is_admin: bool) {
    service
        .create_account(CreateAccountInput {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            is_admin,
        })
        .await
        .unwrap();
}

pub fn app(state: &AppState) -> Router {
    build_router(state.clone(), "http://localhost:3000")
}

pub fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` part of the first Set-Cookie header
pub fn cookie_pair(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location")
        .to_str()
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn login(state: &AppState, email: &str) -> Response<Body> {
    app(state)
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/login",
            None,
            serde_json::json!({ "email": email, "password": PASSWORD }),
        ))
        .await
        .unwrap()
}

pub async fn login_cookie(state: &AppState, email: &str) -> String {
    let response = login(state, email).await;
    assert_eq!(response.status(), StatusCode::OK);
    cookie_pair(&response)
}

/// Register a pet through the API and return its id
pub async fn create_pet(state: &AppState, cookie: &str, body: serde_json::Value) -> String {
    let response = app(state)
        .oneshot(json_request("POST", "/api/v1/pets", Some(cookie), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_str().unwrap().to_string()
}
