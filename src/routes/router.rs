//! Router Configuration
//!
//! Assembles all routes into one axum router:
//!
//! - `GET /ws` - the WebSocket gateway
//! - `POST /api/register|login|refresh|upload` - REST surface
//! - `GET /uploads/*` - stored attachments
//! - `GET /health` - liveness probe

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::gateway::ws_handler;
use crate::routes::api_routes::configure_api_routes;
use crate::server::state::AppState;

pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health));

    let router = configure_api_routes(router);

    let router = router.nest_service("/uploads", ServeDir::new(app_state.upload_dir.clone()));

    router
        .layer(CorsLayer::permissive())
        .fallback(|| async { "404 Not Found" })
        .with_state(app_state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
