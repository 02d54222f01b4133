//! Message events
//!
//! `load_messages`, `send_message`, `receipt`, `pin_message`,
//! `unpin_message`.

use serde_json::{json, Value};

use crate::conversation::{self, messages};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ConnCtx;
use crate::model::{FileMeta, MessageKind};
use crate::protocol::events;
use crate::protocol::requests::{
    self, LoadMessagesRequest, PinMessageRequest, ReceiptRequest, SendMessageRequest,
    UnpinMessageRequest,
};
use crate::server::state::AppState;

pub async fn load(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: LoadMessagesRequest = requests::decode(data)?;
    let conv = conversation::load(&state.pool, request.conversation_id).await?;
    if !conv.has_participant(ctx.user) {
        return Err(GatewayError::permission(
            "Not a participant of this conversation",
        ));
    }

    let limit = request.limit.unwrap_or(messages::DEFAULT_LIMIT);
    let page = messages::list(&state.pool, conv.id, limit).await?;
    state.registry.deliver(
        ctx.conn,
        events::MESSAGES_LOADED,
        json!({ "conversation_id": conv.id, "messages": page }),
        request_id,
    );
    Ok(())
}

/// Persist the message, ack the sender, then fan out: one room broadcast
/// for connections viewing the conversation, and a direct notification for
/// every other participant whose connection is not in the room. The sender
/// is never double-notified.
pub async fn send(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: SendMessageRequest = requests::decode(data)?;
    let kind = request
        .msg_type
        .as_deref()
        .map(MessageKind::from_str)
        .unwrap_or_default();
    let file = request.file_url.map(|url| FileMeta {
        url,
        name: request.file_name,
        size: request.file_size,
    });

    let message = messages::insert(
        &state.pool,
        request.conversation_id,
        ctx.user,
        request.text.as_deref(),
        kind,
        file.as_ref(),
    )
    .await?;

    state.registry.deliver(
        ctx.conn,
        events::SEND_ACK,
        json!({
            "conversation_id": message.conversation_id,
            "client_msg_id": request.client_msg_id,
            "server_msg_id": message.id,
            "status": "sent",
            "created_at": message.created_at,
        }),
        request_id,
    );

    state.registry.broadcast_room(
        message.conversation_id,
        events::NEW_MESSAGE,
        json!({ "conversation_id": message.conversation_id, "message": message }),
        None,
    );

    // Participants who have not opened the room still get a live update,
    // with the refreshed conversation summary for their sidebar.
    let conv = conversation::load(&state.pool, message.conversation_id).await?;
    for user in &conv.participants {
        if *user == ctx.user || state.registry.is_in_room(conv.id, *user) {
            continue;
        }
        state.registry.deliver_user(
            *user,
            events::NEW_MESSAGE,
            json!({
                "conversation_id": conv.id,
                "message": message,
                "conversation": conv,
            }),
        );
    }
    Ok(())
}

/// Upsert the caller's receipt and broadcast the change to the room.
pub async fn receipt(state: &AppState, ctx: ConnCtx, data: Option<Value>) -> GatewayResult<()> {
    let request: ReceiptRequest = requests::decode(data)?;
    let receipt = messages::set_receipt(
        &state.pool,
        request.conversation_id,
        request.message_id,
        ctx.user,
        request.status,
    )
    .await?;

    state.registry.broadcast_room(
        request.conversation_id,
        events::RECEIPT_UPDATE,
        json!({
            "conversation_id": request.conversation_id,
            "message_id": request.message_id,
            "user_id": ctx.user,
            "status": receipt.status,
            "updated_at": receipt.updated_at,
        }),
        None,
    );
    Ok(())
}

pub async fn pin(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: PinMessageRequest = requests::decode(data)?;
    let conv =
        conversation::pin_message(&state.pool, request.conversation_id, ctx.user, request.message_id)
            .await?;

    let payload = json!({
        "conversation_id": conv.id,
        "pinned_message": conv.pinned_message,
    });
    state.registry.deliver(
        ctx.conn,
        events::PINNED_MESSAGE_UPDATED,
        payload.clone(),
        request_id,
    );
    state
        .registry
        .broadcast_room(conv.id, events::PINNED_MESSAGE_UPDATED, payload.clone(), Some(ctx.user));
    state
        .registry
        .notify_participants(&state.pool, conv.id, events::PINNED_MESSAGE_UPDATED, payload, Some(ctx.user))
        .await?;
    Ok(())
}

pub async fn unpin(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: UnpinMessageRequest = requests::decode(data)?;
    let conv = conversation::unpin_message(&state.pool, request.conversation_id, ctx.user).await?;

    let payload = json!({
        "conversation_id": conv.id,
        "pinned_message": Value::Null,
    });
    state.registry.deliver(
        ctx.conn,
        events::PINNED_MESSAGE_UPDATED,
        payload.clone(),
        request_id,
    );
    state
        .registry
        .broadcast_room(conv.id, events::PINNED_MESSAGE_UPDATED, payload.clone(), Some(ctx.user));
    state
        .registry
        .notify_participants(&state.pool, conv.id, events::PINNED_MESSAGE_UPDATED, payload, Some(ctx.user))
        .await?;
    Ok(())
}
