//! Conversation state machine
//!
//! Owns direct and group conversation documents and their membership/admin
//! rules. The embedded message log lives in [`messages`].
//!
//! A direct conversation is uniquely identified by its sorted participant
//! pair; `create_or_get_direct` arbitrates concurrent creation through the
//! unique index on `pair_key`.

pub mod messages;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{GatewayError, GatewayResult};
use crate::friendship;
use crate::keys::{direct_pair_key, ConversationKey, MessageKey, UserKey};
use crate::model::{Conversation, ConversationKind, ConversationStatus, LastMessage};
use crate::store;

fn conversation_from_row(row: &sqlx::sqlite::SqliteRow) -> GatewayResult<Conversation> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let last_message = match (
        row.get::<Option<UserKey>, _>("last_message_sender"),
        row.get::<Option<DateTime<Utc>>, _>("last_message_at"),
    ) {
        (Some(sender), Some(created_at)) => Some(LastMessage {
            text: row.get("last_message_text"),
            sender,
            created_at,
        }),
        _ => None,
    };

    Ok(Conversation {
        id: row.get("id"),
        kind: ConversationKind::from_str(&kind)
            .ok_or_else(|| GatewayError::validation(format!("unknown conversation kind {kind}")))?,
        participants: Vec::new(),
        status: ConversationStatus::from_str(&status)
            .ok_or_else(|| GatewayError::validation(format!("unknown conversation status {status}")))?,
        initiator: row.get("initiator"),
        name: row.get("name"),
        avatar_url: row.get("avatar_url"),
        admins: Vec::new(),
        created_by: row.get("created_by"),
        pinned_message: row.get("pinned_message"),
        last_message,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

async fn fill_participants(pool: &SqlitePool, conv: &mut Conversation) -> GatewayResult<()> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, is_admin FROM conversation_participants
        WHERE conversation_id = ?1 ORDER BY joined_at ASC
        "#,
    )
    .bind(conv.id)
    .fetch_all(pool)
    .await?;

    conv.participants = rows.iter().map(|r| r.get::<UserKey, _>("user_id")).collect();
    conv.admins = rows
        .iter()
        .filter(|r| r.get::<bool, _>("is_admin"))
        .map(|r| r.get::<UserKey, _>("user_id"))
        .collect();
    Ok(())
}

/// Load a conversation or fail with `NOT_FOUND`.
pub async fn load(pool: &SqlitePool, key: ConversationKey) -> GatewayResult<Conversation> {
    let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| GatewayError::not_found("Conversation does not exist"))?;

    let mut conv = conversation_from_row(&row)?;
    fill_participants(pool, &mut conv).await?;
    Ok(conv)
}

/// Participant keys only; used by the registry's fan-out path.
pub async fn participants_of(
    pool: &SqlitePool,
    key: ConversationKey,
) -> GatewayResult<Vec<UserKey>> {
    let rows = sqlx::query(
        "SELECT user_id FROM conversation_participants WHERE conversation_id = ?1",
    )
    .bind(key)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|r| r.get("user_id")).collect())
}

/// Get the direct conversation for an unordered user pair, creating it if
/// absent. Returns the conversation and whether this call created it.
///
/// Creation is `accepted` when the pair are friends, `pending` otherwise.
/// The unique `pair_key` index makes concurrent calls from both sides
/// converge on a single document.
pub async fn create_or_get_direct(
    pool: &SqlitePool,
    user_a: UserKey,
    user_b: UserKey,
    initiator: UserKey,
) -> GatewayResult<(Conversation, bool)> {
    if user_a == user_b {
        return Err(GatewayError::validation(
            "Cannot open a direct conversation with yourself",
        ));
    }

    let pair_key = direct_pair_key(user_a, user_b);
    let status = if friendship::are_friends(pool, user_a, user_b).await? {
        ConversationStatus::Accepted
    } else {
        ConversationStatus::Pending
    };

    let id = ConversationKey::generate();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        r#"
        INSERT INTO conversations (id, kind, pair_key, status, initiator, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (pair_key) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(ConversationKind::Direct.as_str())
    .bind(&pair_key)
    .bind(status.as_str())
    .bind(initiator)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted > 0 {
        for user in [user_a, user_b] {
            sqlx::query(
                r#"
                INSERT INTO conversation_participants (conversation_id, user_id, is_admin, joined_at)
                VALUES (?1, ?2, 0, ?3)
                "#,
            )
            .bind(id)
            .bind(user)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    let key = if inserted > 0 {
        id
    } else {
        sqlx::query("SELECT id FROM conversations WHERE pair_key = ?1")
            .bind(&pair_key)
            .fetch_one(pool)
            .await?
            .get("id")
    };

    Ok((load(pool, key).await?, inserted > 0))
}

/// All conversations `user` participates in, most recently active first.
pub async fn list_for_user(pool: &SqlitePool, user: UserKey) -> GatewayResult<Vec<Conversation>> {
    let rows = sqlx::query(
        r#"
        SELECT c.* FROM conversations c
        JOIN conversation_participants p ON p.conversation_id = c.id
        WHERE p.user_id = ?1
        ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
        "#,
    )
    .bind(user)
    .fetch_all(pool)
    .await?;

    let mut conversations = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut conv = conversation_from_row(row)?;
        fill_participants(pool, &mut conv).await?;
        conversations.push(conv);
    }
    Ok(conversations)
}

/// Explicitly accept a pending conversation (the non-initiator consenting).
pub async fn accept(pool: &SqlitePool, key: ConversationKey) -> GatewayResult<()> {
    let updated = sqlx::query("UPDATE conversations SET status = ?1 WHERE id = ?2")
        .bind(ConversationStatus::Accepted.as_str())
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(GatewayError::not_found("Conversation does not exist"));
    }
    Ok(())
}

/// Create a group conversation.
///
/// Requires at least two member keys distinct from the creator; the creator
/// is always included, is the sole initial admin, and is immutable as
/// `created_by`. Groups are born accepted.
pub async fn create_group(
    pool: &SqlitePool,
    creator: UserKey,
    name: &str,
    member_ids: &[UserKey],
) -> GatewayResult<Conversation> {
    if name.trim().is_empty() {
        return Err(GatewayError::validation("Group name is required"));
    }

    let mut members: Vec<UserKey> = member_ids
        .iter()
        .copied()
        .filter(|&m| m != creator)
        .collect();
    members.sort();
    members.dedup();
    if members.len() < 2 {
        return Err(GatewayError::validation(
            "A group needs at least two other members",
        ));
    }
    for member in &members {
        if store::users::get_user(pool, *member).await?.is_none() {
            return Err(GatewayError::user_not_found());
        }
    }

    let id = ConversationKey::generate();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO conversations (id, kind, status, name, created_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(id)
    .bind(ConversationKind::Group.as_str())
    .bind(ConversationStatus::Accepted.as_str())
    .bind(name.trim())
    .bind(creator)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO conversation_participants (conversation_id, user_id, is_admin, joined_at)
        VALUES (?1, ?2, 1, ?3)
        "#,
    )
    .bind(id)
    .bind(creator)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    for member in &members {
        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, user_id, is_admin, joined_at)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(id)
        .bind(member)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    load(pool, id).await
}

fn require_group(conv: &Conversation) -> GatewayResult<()> {
    if conv.kind != ConversationKind::Group {
        return Err(GatewayError::validation("Not a group conversation"));
    }
    Ok(())
}

/// Add a member to a group. Caller must be an admin; the add is idempotent.
pub async fn add_member(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
    new_member: UserKey,
) -> GatewayResult<Conversation> {
    let conv = load(pool, key).await?;
    require_group(&conv)?;
    if !conv.is_admin(actor) {
        return Err(GatewayError::permission("Only admins can add members"));
    }
    if store::users::get_user(pool, new_member).await?.is_none() {
        return Err(GatewayError::user_not_found());
    }

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO conversation_participants
            (conversation_id, user_id, is_admin, joined_at)
        VALUES (?1, ?2, 0, ?3)
        "#,
    )
    .bind(key)
    .bind(new_member)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    load(pool, key).await
}

/// Remove a member from a group.
///
/// Admins may remove anyone but the creator; any member may remove
/// themselves. The creator can never be removed, not even by themselves.
pub async fn remove_member(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
    target: UserKey,
) -> GatewayResult<Conversation> {
    let conv = load(pool, key).await?;
    require_group(&conv)?;
    if conv.created_by == Some(target) {
        return Err(GatewayError::permission(
            "The group creator cannot be removed",
        ));
    }
    if actor != target && !conv.is_admin(actor) {
        return Err(GatewayError::permission("Only admins can remove members"));
    }

    sqlx::query(
        "DELETE FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
    )
    .bind(key)
    .bind(target)
    .execute(pool)
    .await?;

    load(pool, key).await
}

/// Update group name/avatar. Caller must be an admin.
pub async fn update_info(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
    name: Option<&str>,
    avatar_url: Option<&str>,
) -> GatewayResult<Conversation> {
    let conv = load(pool, key).await?;
    require_group(&conv)?;
    if !conv.is_admin(actor) {
        return Err(GatewayError::permission(
            "Only admins can update group info",
        ));
    }

    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(GatewayError::validation("Group name cannot be empty"));
        }
        sqlx::query("UPDATE conversations SET name = ?1 WHERE id = ?2")
            .bind(name.trim())
            .bind(key)
            .execute(pool)
            .await?;
    }
    if let Some(avatar_url) = avatar_url {
        sqlx::query("UPDATE conversations SET avatar_url = ?1 WHERE id = ?2")
            .bind(avatar_url)
            .bind(key)
            .execute(pool)
            .await?;
    }

    load(pool, key).await
}

/// Pin a message. The message must belong to this conversation and the
/// caller must be a participant.
pub async fn pin_message(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
    message: MessageKey,
) -> GatewayResult<Conversation> {
    let conv = load(pool, key).await?;
    if !conv.has_participant(actor) {
        return Err(GatewayError::permission("Not a participant"));
    }

    let belongs = sqlx::query("SELECT 1 FROM messages WHERE id = ?1 AND conversation_id = ?2")
        .bind(message)
        .bind(key)
        .fetch_optional(pool)
        .await?
        .is_some();
    if !belongs {
        return Err(GatewayError::not_found(
            "Message does not belong to this conversation",
        ));
    }

    sqlx::query("UPDATE conversations SET pinned_message = ?1 WHERE id = ?2")
        .bind(message)
        .bind(key)
        .execute(pool)
        .await?;

    load(pool, key).await
}

/// Clear the pinned message.
pub async fn unpin_message(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
) -> GatewayResult<Conversation> {
    let conv = load(pool, key).await?;
    if !conv.has_participant(actor) {
        return Err(GatewayError::permission("Not a participant"));
    }

    sqlx::query("UPDATE conversations SET pinned_message = NULL WHERE id = ?1")
        .bind(key)
        .execute(pool)
        .await?;

    load(pool, key).await
}

/// Hard-delete a conversation with its log.
///
/// Direct: any participant may delete. Group: admins only. Returns the
/// participant list captured before deletion so callers can still notify.
pub async fn delete(
    pool: &SqlitePool,
    key: ConversationKey,
    actor: UserKey,
) -> GatewayResult<Vec<UserKey>> {
    let conv = load(pool, key).await?;
    let allowed = match conv.kind {
        ConversationKind::Direct => conv.has_participant(actor),
        ConversationKind::Group => conv.is_admin(actor) || conv.created_by == Some(actor),
    };
    if !allowed {
        return Err(GatewayError::permission(
            "Not allowed to delete this conversation",
        ));
    }

    let participants = conv.participants.clone();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        DELETE FROM receipts WHERE message_id IN
            (SELECT id FROM messages WHERE conversation_id = ?1)
        "#,
    )
    .bind(key)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
        .bind(key)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = ?1")
        .bind(key)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM conversations WHERE id = ?1")
        .bind(key)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(participants)
}
