//! User document access

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::{GatewayError, GatewayResult};
use crate::keys::UserKey;
use crate::model::{PublicUser, User};

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    }
}

/// Create a new user. Fails with a conflict when the username is taken.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    avatar_url: Option<&str>,
) -> GatewayResult<User> {
    let id = UserKey::generate();
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, avatar_url, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(avatar_url)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            avatar_url: avatar_url.map(str::to_string),
            created_at: now,
        }),
        Err(e) if is_unique_violation(&e) => Err(GatewayError::conflict(
            "USERNAME_TAKEN",
            "Username already exists",
        )),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}

/// Get user by key
pub async fn get_user(pool: &SqlitePool, id: UserKey) -> GatewayResult<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Get user by display name
pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> GatewayResult<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Resolve a boundary string that may be a user key or a display name.
pub async fn resolve_user(pool: &SqlitePool, key_or_name: &str) -> GatewayResult<User> {
    if let Ok(key) = key_or_name.parse::<UserKey>() {
        if let Some(user) = get_user(pool, key).await? {
            return Ok(user);
        }
    }
    get_user_by_username(pool, key_or_name)
        .await?
        .ok_or_else(GatewayError::user_not_found)
}

/// Search by key or display name, capped at `limit`.
///
/// An exact key match leads the results; the rest is a case-insensitive
/// substring match on display names.
pub async fn search_users(
    pool: &SqlitePool,
    query: &str,
    limit: u32,
) -> GatewayResult<Vec<PublicUser>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    if let Ok(key) = query.parse::<UserKey>() {
        if let Some(user) = get_user(pool, key).await? {
            results.push(user.public());
        }
    }

    let rows = sqlx::query(
        r#"
        SELECT id, username, avatar_url FROM users
        WHERE username LIKE '%' || ?1 || '%'
        ORDER BY username ASC
        LIMIT ?2
        "#,
    )
    .bind(query)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    for row in rows {
        let user = PublicUser {
            user_id: row.get("id"),
            username: row.get("username"),
            avatar_url: row.get("avatar_url"),
        };
        if !results.iter().any(|u| u.user_id == user.user_id) {
            results.push(user);
        }
    }
    results.truncate(limit as usize);
    Ok(results)
}
