//! Database schema
//!
//! Applied at startup with `CREATE TABLE IF NOT EXISTS`, one statement per
//! table so a partially created schema heals on the next boot.
//!
//! The message log is the relational port of the embedded-array model:
//! rows keyed by `(conversation_id, seq)`, with `seq` assigned inside the
//! insert transaction so appends stay atomic and ordered.

use sqlx::SqlitePool;

use crate::error::GatewayResult;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id            BLOB PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        avatar_url    TEXT,
        created_at    TEXT NOT NULL
    )",
    // One row per friendship, pair canonically sorted.
    "CREATE TABLE IF NOT EXISTS friendships (
        user_a     BLOB NOT NULL,
        user_b     BLOB NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_a, user_b)
    )",
    "CREATE TABLE IF NOT EXISTS friend_requests (
        from_user  BLOB NOT NULL,
        to_user    BLOB NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (from_user, to_user)
    )",
    // pair_key is the sorted participant pair for direct conversations; its
    // unique index is the get-or-insert arbiter. NULL for groups.
    "CREATE TABLE IF NOT EXISTS conversations (
        id                  BLOB PRIMARY KEY,
        kind                TEXT NOT NULL,
        pair_key            TEXT UNIQUE,
        status              TEXT NOT NULL,
        initiator           BLOB,
        name                TEXT,
        avatar_url          TEXT,
        created_by          BLOB,
        pinned_message      BLOB,
        last_message_text   TEXT,
        last_message_sender BLOB,
        last_message_at     TEXT,
        created_at          TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS conversation_participants (
        conversation_id BLOB NOT NULL,
        user_id         BLOB NOT NULL,
        is_admin        INTEGER NOT NULL DEFAULT 0,
        joined_at       TEXT NOT NULL,
        PRIMARY KEY (conversation_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id              BLOB PRIMARY KEY,
        conversation_id BLOB NOT NULL,
        seq             INTEGER NOT NULL,
        sender          BLOB NOT NULL,
        body            TEXT,
        kind            TEXT NOT NULL,
        file_url        TEXT,
        file_name       TEXT,
        file_size       INTEGER,
        created_at      TEXT NOT NULL,
        UNIQUE (conversation_id, seq)
    )",
    "CREATE TABLE IF NOT EXISTS receipts (
        message_id BLOB NOT NULL,
        user_id    BLOB NOT NULL,
        status     TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (message_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_participants_user
        ON conversation_participants (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages (conversation_id, seq)",
];

/// Create all tables and indexes.
pub async fn init(pool: &SqlitePool) -> GatewayResult<()> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::debug!("schema initialized ({} statements)", TABLES.len());
    Ok(())
}
