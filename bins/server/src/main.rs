//! Aegle API Server
//!
//! Main entry point for the Aegle attachment service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aegle_api::{AppState, create_router};
use aegle_core::attachment::AttachmentConfig;
use aegle_core::storage::{OpendalGateway, StorageProvider};
use aegle_db::connect;
use aegle_shared::AppConfig;
use aegle_shared::config::load_sources;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aegle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let sources = load_sources().expect("Failed to load configuration");
    let config: AppConfig = sources
        .clone()
        .try_deserialize()
        .expect("Failed to parse configuration");

    // Storage provider and attachment policy sections fall back to
    // development defaults when absent.
    let provider: StorageProvider = sources
        .get("storage.provider")
        .unwrap_or_else(|_| StorageProvider::local_fs("./storage"));
    let attachments: AttachmentConfig = sources.get("attachments").unwrap_or_default();

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Build the storage gateway
    let storage = OpendalGateway::from_provider(provider)?;
    info!(
        provider = storage.provider_name(),
        bucket = storage.bucket(),
        "Storage gateway ready"
    );

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        storage: Arc::new(storage),
        attachments,
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
