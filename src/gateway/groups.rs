//! Group events
//!
//! `create_group`, `add_group_member`, `remove_group_member`,
//! `update_group_info`.

use serde_json::{json, Value};

use crate::conversation;
use crate::error::GatewayResult;
use crate::gateway::ConnCtx;
use crate::keys::UserKey;
use crate::protocol::events;
use crate::protocol::requests::{
    self, CreateGroupRequest, GroupMemberRequest, UpdateGroupInfoRequest,
};
use crate::server::state::AppState;
use crate::store;

async fn resolve_members(state: &AppState, ids: &[String]) -> GatewayResult<Vec<UserKey>> {
    let mut members = Vec::with_capacity(ids.len());
    for id in ids {
        members.push(store::users::resolve_user(&state.pool, id).await?.id);
    }
    Ok(members)
}

pub async fn create(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: CreateGroupRequest = requests::decode(data)?;
    let members = resolve_members(state, &request.member_ids).await?;

    let conv = conversation::create_group(&state.pool, ctx.user, &request.name, &members).await?;

    state.registry.deliver(
        ctx.conn,
        events::GROUP_CREATED,
        json!({ "conversation": conv }),
        request_id,
    );
    for user in &conv.participants {
        if *user != ctx.user {
            state.registry.deliver_user(
                *user,
                events::NEW_CONVERSATION,
                json!({ "conversation": conv }),
            );
        }
    }
    Ok(())
}

pub async fn add_member(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: GroupMemberRequest = requests::decode(data)?;
    let member = store::users::resolve_user(&state.pool, &request.member_id).await?;

    let conv =
        conversation::add_member(&state.pool, request.conversation_id, ctx.user, member.id).await?;

    state.registry.deliver(
        ctx.conn,
        events::MEMBER_ADDED,
        json!({ "conversation_id": conv.id, "member_id": member.id }),
        request_id,
    );
    // The new member sees the conversation appear.
    state.registry.deliver_user(
        member.id,
        events::NEW_CONVERSATION,
        json!({ "conversation": conv }),
    );
    state.registry.broadcast_room(
        conv.id,
        events::MEMBER_ADDED,
        json!({ "conversation_id": conv.id, "member_id": member.id, "added_by": ctx.user }),
        Some(ctx.user),
    );
    state
        .registry
        .notify_participants(
            &state.pool,
            conv.id,
            events::CONVERSATION_UPDATED,
            json!({ "conversation": conv }),
            Some(ctx.user),
        )
        .await?;
    Ok(())
}

pub async fn remove_member(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: GroupMemberRequest = requests::decode(data)?;
    let member = store::users::resolve_user(&state.pool, &request.member_id).await?;

    let conv =
        conversation::remove_member(&state.pool, request.conversation_id, ctx.user, member.id)
            .await?;

    state.registry.deliver(
        ctx.conn,
        events::MEMBER_REMOVED,
        json!({ "conversation_id": conv.id, "member_id": member.id }),
        request_id,
    );
    state.registry.deliver_user(
        member.id,
        events::REMOVED_FROM_GROUP,
        json!({ "conversation_id": conv.id }),
    );
    state.registry.broadcast_room(
        conv.id,
        events::MEMBER_REMOVED,
        json!({ "conversation_id": conv.id, "member_id": member.id, "removed_by": ctx.user }),
        Some(ctx.user),
    );
    state
        .registry
        .notify_participants(
            &state.pool,
            conv.id,
            events::CONVERSATION_UPDATED,
            json!({ "conversation": conv }),
            Some(ctx.user),
        )
        .await?;
    Ok(())
}

pub async fn update_info(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: UpdateGroupInfoRequest = requests::decode(data)?;

    let conv = conversation::update_info(
        &state.pool,
        request.conversation_id,
        ctx.user,
        request.name.as_deref(),
        request.avatar.as_deref(),
    )
    .await?;

    state.registry.deliver(
        ctx.conn,
        events::GROUP_UPDATED,
        json!({ "conversation_id": conv.id }),
        request_id,
    );
    state.registry.broadcast_room(
        conv.id,
        events::GROUP_INFO_UPDATED,
        json!({
            "conversation_id": conv.id,
            "name": conv.name,
            "avatar": conv.avatar_url,
        }),
        Some(ctx.user),
    );
    Ok(())
}
