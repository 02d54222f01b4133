//! Conversation events
//!
//! `get_direct_conversation`, `get_conversations`, `join`,
//! `accept_conversation`, `delete_conversation`.

use serde_json::{json, Value};

use crate::conversation;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::ConnCtx;
use crate::model::ConversationStatus;
use crate::protocol::requests::{
    self, AcceptConversationRequest, DeleteConversationRequest, DirectConversationRequest,
    JoinRequest,
};
use crate::protocol::events;
use crate::server::state::AppState;
use crate::store;

/// Resolve-or-create the direct conversation with another user.
///
/// When this call created a pending conversation, the target is notified so
/// the consent prompt shows up live.
pub async fn get_direct(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: DirectConversationRequest = requests::decode(data)?;
    let other = store::users::resolve_user(&state.pool, &request.other_user_id).await?;
    if other.id == ctx.user {
        return Err(GatewayError::validation(
            "Cannot open a direct conversation with yourself",
        ));
    }

    let (conv, created) =
        conversation::create_or_get_direct(&state.pool, ctx.user, other.id, ctx.user).await?;

    if created && conv.status == ConversationStatus::Pending {
        state.registry.deliver_user(
            other.id,
            events::NEW_CONVERSATION,
            json!({ "conversation": conv }),
        );
    }

    state.registry.deliver(
        ctx.conn,
        events::DIRECT_CONVERSATION,
        json!({ "conversation": conv }),
        request_id,
    );
    Ok(())
}

pub async fn list(state: &AppState, ctx: ConnCtx, request_id: Option<&str>) -> GatewayResult<()> {
    let conversations = conversation::list_for_user(&state.pool, ctx.user).await?;
    state.registry.deliver(
        ctx.conn,
        events::CONVERSATIONS_LIST,
        json!({ "conversations": conversations }),
        request_id,
    );
    Ok(())
}

/// Join the conversation's room. Membership in the conversation is
/// required; a removed group member can no longer join.
pub async fn join(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: JoinRequest = requests::decode(data)?;
    let conv = conversation::load(&state.pool, request.conversation_id).await?;
    if !conv.has_participant(ctx.user) {
        return Err(GatewayError::permission(
            "Not a participant of this conversation",
        ));
    }

    state.registry.join(ctx.conn, conv.id);
    state.registry.deliver(
        ctx.conn,
        events::JOIN_OK,
        json!({ "conversation_id": conv.id }),
        request_id,
    );
    Ok(())
}

/// Explicitly accept a pending conversation from a stranger.
pub async fn accept(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: AcceptConversationRequest = requests::decode(data)?;
    let conv = conversation::load(&state.pool, request.conversation_id).await?;
    if !conv.has_participant(ctx.user) {
        return Err(GatewayError::permission(
            "Not a participant of this conversation",
        ));
    }

    conversation::accept(&state.pool, conv.id).await?;
    state.registry.deliver(
        ctx.conn,
        events::CONVERSATION_ACCEPTED,
        json!({ "conversation_id": conv.id }),
        request_id,
    );
    Ok(())
}

/// Hard-delete a conversation and tell the other participants directly;
/// the document is gone, so the participant list is captured beforehand.
pub async fn delete(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: DeleteConversationRequest = requests::decode(data)?;
    let participants =
        conversation::delete(&state.pool, request.conversation_id, ctx.user).await?;

    state.registry.deliver(
        ctx.conn,
        events::CONVERSATION_DELETED,
        json!({ "conversation_id": request.conversation_id }),
        request_id,
    );
    for user in participants {
        if user != ctx.user {
            state.registry.deliver_user(
                user,
                events::CONVERSATION_DELETED,
                json!({ "conversation_id": request.conversation_id }),
            );
        }
    }
    Ok(())
}
