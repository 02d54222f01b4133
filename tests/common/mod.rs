//! Test fixtures shared by the integration suites
#![allow(dead_code)]

use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use chatway::gateway::ConnCtx;
use chatway::keys::UserKey;
use chatway::session::{ConnId, SessionRegistry};
use chatway::{store, AppState};

/// Fresh in-memory store with the schema applied.
pub async fn test_pool() -> SqlitePool {
    store::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory store")
}

/// Create a user directly in the store.
///
/// Uses a placeholder credential; bcrypt rounds are too slow to pay per
/// fixture user and nothing here exercises login.
pub async fn create_user(pool: &SqlitePool, username: &str) -> UserKey {
    store::users::create_user(pool, username, "test-credential", None)
        .await
        .expect("failed to create test user")
        .id
}

/// Application state around an in-memory store.
pub async fn test_state() -> AppState {
    AppState {
        pool: test_pool().await,
        registry: Arc::new(SessionRegistry::new()),
        upload_dir: std::env::temp_dir(),
    }
}

/// Simulated client: a registered connection whose outbound frames land in
/// the returned receiver, bound to `user`.
pub fn connect(state: &AppState, user: UserKey) -> (ConnCtx, UnboundedReceiver<String>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let conn: ConnId = state.registry.register(tx);
    state.registry.bind(conn, user);
    (ConnCtx { conn, user }, rx)
}

/// Drain every frame currently queued on a receiver, parsed as JSON.
pub fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("malformed outbound frame"));
    }
    frames
}
