//! Event router
//!
//! One WebSocket endpoint; each accepted connection runs its own loop in
//! [`connection`], which decodes envelopes, tracks the
//! unauthenticated→authenticated transition, and dispatches every event to
//! exactly one state-machine operation in the per-area handler modules.

pub mod connection;
pub mod conversations;
pub mod friends;
pub mod groups;
pub mod messages;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;

use crate::keys::UserKey;
use crate::server::state::AppState;
use crate::session::ConnId;

/// Authenticated context of one connection while handling an event.
#[derive(Debug, Clone, Copy)]
pub struct ConnCtx {
    pub conn: ConnId,
    pub user: UserKey,
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, state))
}
