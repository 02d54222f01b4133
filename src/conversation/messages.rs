//! The conversation's message log
//!
//! Relational port of the embedded message array: rows keyed by
//! `(conversation_id, seq)`. The append assigns `seq` and refreshes the
//! conversation's `last_message` cache inside one transaction, so the
//! atomic append + scalar-set contract of the embedded model is preserved.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::error::{GatewayError, GatewayResult};
use crate::keys::{ConversationKey, MessageKey, UserKey};
use crate::model::{FileMeta, MessageKind, Receipt, ReceiptStatus, StoredMessage};

/// Default page size for `list`.
pub const DEFAULT_LIMIT: u32 = 50;

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredMessage {
    let kind: String = row.get("kind");
    let file = row
        .get::<Option<String>, _>("file_url")
        .map(|url| FileMeta {
            url,
            name: row.get("file_name"),
            size: row.get("file_size"),
        });
    StoredMessage {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        seq: row.get("seq"),
        sender: row.get("sender"),
        text: row.get("body"),
        kind: MessageKind::from_str(&kind),
        file,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        receipts: HashMap::new(),
    }
}

/// Append a message to the conversation's log.
///
/// Fails with `NOT_FOUND` when the conversation key does not resolve and
/// `FORBIDDEN` when the sender is not a participant. On success the stored
/// message (with its generated key and server timestamp) is returned.
pub async fn insert(
    pool: &SqlitePool,
    conversation: ConversationKey,
    sender: UserKey,
    text: Option<&str>,
    kind: MessageKind,
    file: Option<&FileMeta>,
) -> GatewayResult<StoredMessage> {
    let text = text.map(str::trim).filter(|t| !t.is_empty());
    if text.is_none() && file.is_none() {
        return Err(GatewayError::validation(
            "A message needs text or an attachment",
        ));
    }

    let mut tx = pool.begin().await?;

    let exists = sqlx::query("SELECT 1 FROM conversations WHERE id = ?1")
        .bind(conversation)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        return Err(GatewayError::not_found("Conversation does not exist"));
    }
    let is_participant = sqlx::query(
        "SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
    )
    .bind(conversation)
    .bind(sender)
    .fetch_optional(&mut *tx)
    .await?
    .is_some();
    if !is_participant {
        return Err(GatewayError::permission(
            "Not a participant of this conversation",
        ));
    }

    let seq: i64 = sqlx::query(
        "SELECT COALESCE(MAX(seq), 0) + 1 AS next FROM messages WHERE conversation_id = ?1",
    )
    .bind(conversation)
    .fetch_one(&mut *tx)
    .await?
    .get("next");

    let id = MessageKey::generate();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO messages
            (id, conversation_id, seq, sender, body, kind, file_url, file_name, file_size, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(id)
    .bind(conversation)
    .bind(seq)
    .bind(sender)
    .bind(text)
    .bind(kind.as_str())
    .bind(file.map(|f| f.url.as_str()))
    .bind(file.and_then(|f| f.name.as_deref()))
    .bind(file.and_then(|f| f.size))
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE conversations
        SET last_message_text = ?1, last_message_sender = ?2, last_message_at = ?3
        WHERE id = ?4
        "#,
    )
    .bind(text)
    .bind(sender)
    .bind(now)
    .bind(conversation)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StoredMessage {
        id,
        conversation_id: conversation,
        seq,
        sender,
        text: text.map(str::to_string),
        kind,
        file: file.cloned(),
        created_at: now,
        receipts: HashMap::new(),
    })
}

/// The most recent `limit` messages in chronological order.
///
/// Reads a tail slice of the log (newest `limit` by `seq`), then reverses
/// it, so old conversations never pay a full-log scan.
pub async fn list(
    pool: &SqlitePool,
    conversation: ConversationKey,
    limit: u32,
) -> GatewayResult<Vec<StoredMessage>> {
    let exists = sqlx::query("SELECT 1 FROM conversations WHERE id = ?1")
        .bind(conversation)
        .fetch_optional(pool)
        .await?
        .is_some();
    if !exists {
        return Err(GatewayError::not_found("Conversation does not exist"));
    }

    let rows = sqlx::query(
        r#"
        SELECT * FROM messages WHERE conversation_id = ?1
        ORDER BY seq DESC LIMIT ?2
        "#,
    )
    .bind(conversation)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut messages: Vec<StoredMessage> = rows.iter().map(message_from_row).collect();
    messages.reverse();

    if let Some(min_seq) = messages.first().map(|m| m.seq) {
        let receipt_rows = sqlx::query(
            r#"
            SELECT r.message_id, r.user_id, r.status, r.updated_at
            FROM receipts r
            JOIN messages m ON m.id = r.message_id
            WHERE m.conversation_id = ?1 AND m.seq >= ?2
            "#,
        )
        .bind(conversation)
        .bind(min_seq)
        .fetch_all(pool)
        .await?;

        let mut by_message: HashMap<MessageKey, HashMap<UserKey, Receipt>> = HashMap::new();
        for row in receipt_rows {
            let status: String = row.get("status");
            let Some(status) = ReceiptStatus::from_str(&status) else {
                continue;
            };
            by_message
                .entry(row.get("message_id"))
                .or_default()
                .insert(
                    row.get("user_id"),
                    Receipt {
                        status,
                        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
                    },
                );
        }
        for message in &mut messages {
            if let Some(receipts) = by_message.remove(&message.id) {
                message.receipts = receipts;
            }
        }
    }

    Ok(messages)
}

/// Upsert `user`'s receipt on a message of this conversation.
pub async fn set_receipt(
    pool: &SqlitePool,
    conversation: ConversationKey,
    message: MessageKey,
    user: UserKey,
    status: ReceiptStatus,
) -> GatewayResult<Receipt> {
    let belongs = sqlx::query("SELECT 1 FROM messages WHERE id = ?1 AND conversation_id = ?2")
        .bind(message)
        .bind(conversation)
        .fetch_optional(pool)
        .await?
        .is_some();
    if !belongs {
        return Err(GatewayError::not_found(
            "Message does not belong to this conversation",
        ));
    }

    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO receipts (message_id, user_id, status, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (message_id, user_id)
        DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
        "#,
    )
    .bind(message)
    .bind(user)
    .bind(status.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Receipt {
        status,
        updated_at: now,
    })
}
