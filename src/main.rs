//! PetBeacon - A lost-pet registry

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petbeacon::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxAccountRepository, SqlxHealthRecordRepository, SqlxPetRepository},
    },
    services::{AccountService, NotificationService, PetService, SessionCookieCodec, SessionGuard},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petbeacon=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PetBeacon...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let account_repo = SqlxAccountRepository::boxed(pool.clone());
    let pet_repo = SqlxPetRepository::boxed(pool.clone());
    let health_repo = SqlxHealthRecordRepository::boxed(pool.clone());

    // Initialize services
    let account_service = Arc::new(AccountService::new(account_repo.clone()));
    let pet_service = Arc::new(PetService::new(pet_repo, health_repo));
    let guard = Arc::new(SessionGuard::new(account_repo, &config.session));
    let cookies = Arc::new(SessionCookieCodec::from_config(&config.session));
    let notifications = Arc::new(NotificationService::from_config(config.smtp.as_ref())?);

    if let Some(admin) = account_service.bootstrap_admin(&config.bootstrap).await? {
        tracing::info!("Bootstrap administrator created: {}", admin.email);
    }
    if !notifications.email_enabled() {
        tracing::warn!("SMTP not configured, owners are reached through phone links only");
    }

    // Build application state
    let state = AppState {
        guard,
        cookies,
        account_service,
        pet_service,
        notifications,
        upload_config: Arc::new(config.upload.clone()),
        public_url: Arc::from(config.server.public_url.as_str()),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
