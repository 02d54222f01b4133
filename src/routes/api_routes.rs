//! API Route Handlers
//!
//! REST endpoints next to the WebSocket gateway:
//!
//! - `POST /api/register` - user registration (public)
//! - `POST /api/login` - login, returns access + refresh tokens (public)
//! - `POST /api/refresh` - refresh token exchange (public)
//! - `POST /api/upload` - attachment upload (bearer token required)

use axum::routing::post;
use axum::Router;

use crate::auth::{login, refresh, register};
use crate::routes::upload::upload_file;
use crate::server::state::AppState;

pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/refresh", post(refresh))
        .route("/api/upload", post(upload_file))
}
