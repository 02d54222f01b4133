//! Application State Management
//!
//! `AppState` is the central state container for the axum application:
//! the store pool, the session registry (the only process-wide mutable
//! state, internally synchronized), and the upload directory. `FromRef`
//! implementations let handlers extract just the part they need.

use axum::extract::FromRef;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    /// Durable store connection pool
    pub pool: SqlitePool,
    /// Live connection bookkeeping, shared by every connection's task
    pub registry: Arc<SessionRegistry>,
    /// Where uploaded attachments land; served under `/uploads`
    pub upload_dir: PathBuf,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.registry.clone()
    }
}
