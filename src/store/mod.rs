//! Persistence gateway
//!
//! Thin accessor layer over the SQLite store: pool bootstrap, schema
//! creation, and user-document access. Conversation and friendship state
//! live with their state machines (`crate::conversation`,
//! `crate::friendship`), which issue their own queries through the pool
//! owned here.

pub mod schema;
pub mod users;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::GatewayResult;

/// Open the store and make sure the schema exists.
///
/// An in-memory URL gets a single pooled connection, otherwise every pool
/// member would see its own empty database.
pub async fn connect(database_url: &str) -> GatewayResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    schema::init(&pool).await?;
    Ok(pool)
}
