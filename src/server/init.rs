//! Server Initialization
//!
//! Builds the application: opens the store (creating the schema), prepares
//! the upload directory, constructs the session registry, and assembles
//! the router.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::GatewayResult;
use crate::routes::router::create_router;
use crate::server::config;
use crate::server::state::AppState;
use crate::session::SessionRegistry;
use crate::store;

/// Create the application against the configured database.
pub async fn create_app() -> GatewayResult<Router<()>> {
    let pool = store::connect(&config::database_url()).await?;
    tracing::info!("store ready");
    Ok(create_app_with_pool(pool))
}

/// Create the application with an existing pool (schema must already be
/// initialized). Tests use this with an in-memory store.
pub fn create_app_with_pool(pool: SqlitePool) -> Router<()> {
    let upload_dir = config::upload_dir();
    if let Err(e) = std::fs::create_dir_all(&upload_dir) {
        tracing::warn!("could not create upload dir {}: {e}", upload_dir.display());
    }

    let app_state = AppState {
        pool,
        registry: Arc::new(SessionRegistry::new()),
        upload_dir,
    };

    create_router(app_state)
}
