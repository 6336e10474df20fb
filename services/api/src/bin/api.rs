//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DataUriDecoder, DbAdapter, InMemoryStore},
    config::{Config, StoreBackend},
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::Router;
use greenlog_core::ports::{CredentialStore, PlantStore, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Plant Store ---
    let (store, credentials): (Arc<dyn PlantStore>, Arc<dyn CredentialStore>) =
        match &config.store_backend {
            StoreBackend::Postgres { database_url } => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool, config.app_id.clone()));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                // Detached; the listener task runs for the life of the process.
                let _change_listener = db_adapter.spawn_change_listener().await?;
                (db_adapter.clone(), db_adapter)
            }
            StoreBackend::Memory => {
                info!("Using the in-memory plant store; data is lost on shutdown.");
                let memory = Arc::new(InMemoryStore::new());
                (memory.clone(), memory)
            }
        };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        credentials,
        decoder: Arc::new(DataUriDecoder::new(config.max_upload_bytes)),
        clock: Arc::new(SystemClock),
        config: config.clone(),
    });

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
