//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes for the attachment pipeline
//! - Request/response types
//! - Error-to-status mapping

pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aegle_core::attachment::AttachmentConfig;
use aegle_core::storage::OpendalGateway;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Object-storage gateway.
    pub storage: Arc<OpendalGateway>,
    /// Attachment policy configuration.
    pub attachments: AttachmentConfig,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
