//! Friendship state machine
//!
//! Owns the friend-request lifecycle and the friendship relation. For any
//! pair of users at most one of {friends, pending request in either
//! direction} holds at a time; `send` enforces the exclusivity up front and
//! the primary keys on both tables back it up.
//!
//! Accepting a request also flips any pending direct conversation between
//! the pair to accepted, inside the same transaction, so the two state
//! machines cannot drift apart.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{GatewayError, GatewayResult};
use crate::keys::{direct_pair_key, ordered_pair, UserKey};
use crate::model::conversation::{ConversationKind, ConversationStatus};
use crate::model::{FriendRequests, IncomingRequest, OutgoingRequest, PublicUser};
use crate::store;

/// Send a friend request from `from` to `to`.
///
/// Fails with `SELF_REQUEST` when the pair is one user, `USER_NOT_FOUND`
/// when the target does not exist, `ALREADY_FRIENDS`/`REQUEST_PENDING` when
/// a relationship already exists in either direction.
pub async fn send(
    pool: &SqlitePool,
    from: UserKey,
    to: UserKey,
) -> GatewayResult<OutgoingRequest> {
    if from == to {
        return Err(GatewayError::conflict(
            "SELF_REQUEST",
            "Cannot send a friend request to yourself",
        ));
    }
    if store::users::get_user(pool, to).await?.is_none() {
        return Err(GatewayError::user_not_found());
    }
    if are_friends(pool, from, to).await? {
        return Err(GatewayError::conflict("ALREADY_FRIENDS", "Already friends"));
    }
    if pending_between(pool, from, to).await? {
        return Err(GatewayError::conflict(
            "REQUEST_PENDING",
            "A friend request between these users is already pending",
        ));
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO friend_requests (from_user, to_user, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(from)
    .bind(to)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(OutgoingRequest {
        to_user: to,
        created_at: now,
    })
}

/// Accept the pending request from `requester` to `self_key`.
///
/// Returns whether a transition occurred; accepting an already-consumed
/// request is a no-op returning `false`. On success the pair becomes
/// friends and any pending direct conversation between them is accepted.
pub async fn accept(
    pool: &SqlitePool,
    self_key: UserKey,
    requester: UserKey,
) -> GatewayResult<bool> {
    let mut tx = pool.begin().await?;

    let removed =
        sqlx::query("DELETE FROM friend_requests WHERE from_user = ?1 AND to_user = ?2")
            .bind(requester)
            .bind(self_key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if removed == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let (lo, hi) = ordered_pair(self_key, requester);
    sqlx::query(
        "INSERT OR IGNORE INTO friendships (user_a, user_b, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(lo)
    .bind(hi)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    // A pending direct conversation between new friends no longer needs
    // consent.
    sqlx::query(
        "UPDATE conversations SET status = ?1 WHERE kind = ?2 AND pair_key = ?3 AND status = ?4",
    )
    .bind(ConversationStatus::Accepted.as_str())
    .bind(ConversationKind::Direct.as_str())
    .bind(direct_pair_key(self_key, requester))
    .bind(ConversationStatus::Pending.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Reject the pending request from `requester` to `self_key`.
pub async fn reject(
    pool: &SqlitePool,
    self_key: UserKey,
    requester: UserKey,
) -> GatewayResult<bool> {
    let removed =
        sqlx::query("DELETE FROM friend_requests WHERE from_user = ?1 AND to_user = ?2")
            .bind(requester)
            .bind(self_key)
            .execute(pool)
            .await?
            .rows_affected();
    Ok(removed > 0)
}

/// Pure lookup: are the two users friends?
pub async fn are_friends(pool: &SqlitePool, a: UserKey, b: UserKey) -> GatewayResult<bool> {
    let (lo, hi) = ordered_pair(a, b);
    let row = sqlx::query("SELECT 1 FROM friendships WHERE user_a = ?1 AND user_b = ?2")
        .bind(lo)
        .bind(hi)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn pending_between(pool: &SqlitePool, a: UserKey, b: UserKey) -> GatewayResult<bool> {
    let row = sqlx::query(
        r#"
        SELECT 1 FROM friend_requests
        WHERE (from_user = ?1 AND to_user = ?2) OR (from_user = ?2 AND to_user = ?1)
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Friends of `user` with their profiles, ordered by display name.
pub async fn friends_of(pool: &SqlitePool, user: UserKey) -> GatewayResult<Vec<PublicUser>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.avatar_url
        FROM friendships f
        JOIN users u ON u.id = CASE WHEN f.user_a = ?1 THEN f.user_b ELSE f.user_a END
        WHERE f.user_a = ?1 OR f.user_b = ?1
        ORDER BY u.username ASC
        "#,
    )
    .bind(user)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PublicUser {
            user_id: row.get("id"),
            username: row.get("username"),
            avatar_url: row.get("avatar_url"),
        })
        .collect())
}

/// Both pending-request projections for `user`, newest first.
pub async fn pending_requests(pool: &SqlitePool, user: UserKey) -> GatewayResult<FriendRequests> {
    let received = sqlx::query(
        r#"
        SELECT from_user, created_at FROM friend_requests
        WHERE to_user = ?1 ORDER BY created_at DESC
        "#,
    )
    .bind(user)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| IncomingRequest {
        from_user: row.get("from_user"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
    .collect();

    let sent = sqlx::query(
        r#"
        SELECT to_user, created_at FROM friend_requests
        WHERE from_user = ?1 ORDER BY created_at DESC
        "#,
    )
    .bind(user)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| OutgoingRequest {
        to_user: row.get("to_user"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
    .collect();

    Ok(FriendRequests { received, sent })
}
