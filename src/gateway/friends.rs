//! Friend events
//!
//! `search_users`, `send_friend_request`, `accept_friend_request`,
//! `reject_friend_request`, `get_friends`, `get_friend_requests`.

use serde_json::{json, Value};

use crate::conversation;
use crate::error::GatewayResult;
use crate::friendship;
use crate::gateway::ConnCtx;
use crate::model::FriendSummary;
use crate::protocol::events;
use crate::protocol::requests::{
    self, RespondFriendRequestRequest, SearchUsersRequest, SendFriendRequestRequest,
};
use crate::server::state::AppState;
use crate::store;

const SEARCH_LIMIT: u32 = 10;

pub async fn search(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: SearchUsersRequest = requests::decode(data)?;
    let users = store::users::search_users(&state.pool, request.query.trim(), SEARCH_LIMIT).await?;
    state.registry.deliver(
        ctx.conn,
        events::SEARCH_RESULTS,
        json!({ "query": request.query, "users": users }),
        request_id,
    );
    Ok(())
}

pub async fn send_request(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: SendFriendRequestRequest = requests::decode(data)?;
    let target = store::users::resolve_user(&state.pool, &request.to_user_id).await?;

    let sent = friendship::send(&state.pool, ctx.user, target.id).await?;

    state.registry.deliver(
        ctx.conn,
        events::FRIEND_REQUEST_SENT,
        json!({ "to_user_id": sent.to_user, "created_at": sent.created_at }),
        request_id,
    );
    state.registry.deliver_user(
        target.id,
        events::FRIEND_REQUEST_RECEIVED,
        json!({ "from_user_id": ctx.user }),
    );
    Ok(())
}

/// Accept a pending request. On a real transition both sides get a
/// refreshed conversation list, because any pending direct conversation
/// between the pair just flipped to accepted.
pub async fn accept_request(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: RespondFriendRequestRequest = requests::decode(data)?;
    let requester = store::users::resolve_user(&state.pool, &request.from_user_id).await?;

    let changed = friendship::accept(&state.pool, ctx.user, requester.id).await?;

    state.registry.deliver(
        ctx.conn,
        events::FRIEND_REQUEST_ACCEPTED,
        json!({ "success": changed, "friend_id": requester.id }),
        request_id,
    );

    if changed {
        state.registry.deliver_user(
            requester.id,
            events::FRIEND_ACCEPTED,
            json!({ "user_id": ctx.user }),
        );
        for user in [ctx.user, requester.id] {
            let conversations = conversation::list_for_user(&state.pool, user).await?;
            state.registry.deliver_user(
                user,
                events::CONVERSATIONS_LIST,
                json!({ "conversations": conversations }),
            );
        }
    }
    Ok(())
}

pub async fn reject_request(
    state: &AppState,
    ctx: ConnCtx,
    data: Option<Value>,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let request: RespondFriendRequestRequest = requests::decode(data)?;
    let requester = store::users::resolve_user(&state.pool, &request.from_user_id).await?;

    let changed = friendship::reject(&state.pool, ctx.user, requester.id).await?;

    state.registry.deliver(
        ctx.conn,
        events::FRIEND_REQUEST_REJECTED,
        json!({ "success": changed, "user_id": requester.id }),
        request_id,
    );
    if changed {
        state.registry.deliver_user(
            requester.id,
            events::FRIEND_REJECTED,
            json!({ "user_id": ctx.user }),
        );
    }
    Ok(())
}

/// Friends list with the live online flag from the registry.
pub async fn list(state: &AppState, ctx: ConnCtx, request_id: Option<&str>) -> GatewayResult<()> {
    let friends: Vec<FriendSummary> = friendship::friends_of(&state.pool, ctx.user)
        .await?
        .into_iter()
        .map(|profile| FriendSummary {
            online: state.registry.is_online(profile.user_id),
            user_id: profile.user_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
        })
        .collect();

    state.registry.deliver(
        ctx.conn,
        events::FRIENDS_LIST,
        json!({ "friends": friends }),
        request_id,
    );
    Ok(())
}

pub async fn list_requests(
    state: &AppState,
    ctx: ConnCtx,
    request_id: Option<&str>,
) -> GatewayResult<()> {
    let pending = friendship::pending_requests(&state.pool, ctx.user).await?;
    state.registry.deliver(
        ctx.conn,
        events::FRIEND_REQUESTS,
        json!({ "received": pending.received, "sent": pending.sent }),
        request_id,
    );
    Ok(())
}
