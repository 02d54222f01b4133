//! Per-connection loop
//!
//! Each connection gets a writer task draining its outbound channel into
//! the socket and a read loop processing envelopes strictly in arrival
//! order. The connection state machine is Connected (unauthenticated) →
//! Authenticated → Disconnected; only a transport-level close ends it,
//! never a handled error.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::auth::tokens;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{conversations, friends, groups, messages, ConnCtx};
use crate::protocol::requests::{self, AuthRequest};
use crate::protocol::{events, now_ms, ClientEnvelope};
use crate::server::state::AppState;
use crate::session::ConnId;
use crate::store;

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let conn = state.registry.register(tx);
    tracing::debug!(?conn, "connection accepted");

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => process_frame(&state, conn, text.as_str()).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // protocol.
            _ => {}
        }
    }

    match state.registry.unbind(conn) {
        Some(user) => {
            state.registry.presence_broadcast(user, false, Some(now_ms()));
            tracing::info!(%user, "user disconnected");
        }
        None => tracing::debug!(?conn, "unauthenticated connection closed"),
    }
    writer.abort();
}

async fn process_frame(state: &AppState, conn: ConnId, raw: &str) {
    let envelope = match ClientEnvelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            send_error(state, conn, &err, None);
            return;
        }
    };
    let request_id = envelope.request_id.clone();
    let request_id = request_id.as_deref();

    if envelope.kind == "auth" {
        if let Err(err) = handle_auth(state, conn, envelope.data, request_id).await {
            send_error(state, conn, &err, request_id);
        }
        return;
    }

    // Everything below requires a bound identity.
    let Some(user) = state.registry.user_of(conn) else {
        send_error(state, conn, &GatewayError::unauthenticated(), request_id);
        return;
    };
    let ctx = ConnCtx { conn, user };

    let result = dispatch(state, ctx, &envelope.kind, envelope.data, request_id).await;
    if let Err(err) = result {
        if matches!(err, GatewayError::Store(_)) {
            tracing::error!(%user, kind = %envelope.kind, "event failed: {err}");
        }
        send_error(state, conn, &err, request_id);
    }
}

async fn dispatch(
    state: &AppState,
    ctx: ConnCtx,
    kind: &str,
    data: Option<serde_json::Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    match kind {
        "get_direct_conversation" => conversations::get_direct(state, ctx, data, request_id).await,
        "get_conversations" => conversations::list(state, ctx, request_id).await,
        "join" => conversations::join(state, ctx, data, request_id).await,
        "accept_conversation" => conversations::accept(state, ctx, data, request_id).await,
        "delete_conversation" => conversations::delete(state, ctx, data, request_id).await,
        "load_messages" => messages::load(state, ctx, data, request_id).await,
        "send_message" => messages::send(state, ctx, data, request_id).await,
        "receipt" => messages::receipt(state, ctx, data).await,
        "pin_message" => messages::pin(state, ctx, data, request_id).await,
        "unpin_message" => messages::unpin(state, ctx, data, request_id).await,
        "search_users" => friends::search(state, ctx, data, request_id).await,
        "send_friend_request" => friends::send_request(state, ctx, data, request_id).await,
        "accept_friend_request" => friends::accept_request(state, ctx, data, request_id).await,
        "reject_friend_request" => friends::reject_request(state, ctx, data, request_id).await,
        "get_friends" => friends::list(state, ctx, request_id).await,
        "get_friend_requests" => friends::list_requests(state, ctx, request_id).await,
        "create_group" => groups::create(state, ctx, data, request_id).await,
        "add_group_member" => groups::add_member(state, ctx, data, request_id).await,
        "remove_group_member" => groups::remove_member(state, ctx, data, request_id).await,
        "update_group_info" => groups::update_info(state, ctx, data, request_id).await,
        other => Err(GatewayError::unknown_type(other)),
    }
}

/// `auth`: verify the supplied access token, bind the identity, announce
/// presence. Failures reply `UNAUTH` without binding; the connection stays
/// open for a retry.
async fn handle_auth(
    state: &AppState,
    conn: ConnId,
    data: Option<serde_json::Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: AuthRequest = requests::decode(data)
        .map_err(|_| GatewayError::auth("Invalid or missing token"))?;
    let user_id = tokens::verify_access_token(&request.token)?;

    // The token may outlive the account.
    let user = store::users::get_user(&state.pool, user_id)
        .await?
        .ok_or_else(|| GatewayError::auth("Invalid or missing token"))?;

    state.registry.bind(conn, user.id);
    state.registry.deliver(
        conn,
        events::AUTH_OK,
        serde_json::json!({ "user_id": user.id, "username": user.username }),
        request_id,
    );
    state.registry.presence_broadcast(user.id, true, None);
    tracing::info!(user_id = %user.id, "connection authenticated");
    Ok(())
}

fn send_error(state: &AppState, conn: ConnId, err: &GatewayError, request_id: Option<&str>) {
    state.registry.deliver(
        conn,
        events::ERROR,
        serde_json::json!({ "code": err.code(), "message": err.to_string() }),
        request_id,
    );
}
