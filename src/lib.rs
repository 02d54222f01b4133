//! Chatway - realtime messaging gateway
//!
//! Clients hold one WebSocket to the server, authenticate with an access
//! token, and exchange chat events: messages, receipts, presence, friend
//! and group lifecycle changes. Durable state (users, conversations with
//! their message logs, friend relations) lives in SQLite; live delivery is
//! best-effort fan-out to currently connected sockets.
//!
//! # Module Structure
//!
//! - **`keys`** - opaque typed keys for users/conversations/messages
//! - **`model`** - domain structs shared by store, state machines and wire
//! - **`protocol`** - envelope shapes and typed event payloads
//! - **`store`** - persistence gateway (pool, schema, user documents)
//! - **`friendship`** - friend-request state machine
//! - **`conversation`** - conversation state machine and its message log
//! - **`session`** - the session registry (connections, rooms, presence)
//! - **`gateway`** - the WebSocket event router
//! - **`auth`** - credential + token services and the auth REST handlers
//! - **`routes`** / **`server`** - router assembly, state, configuration
//!
//! # Data flow
//!
//! Inbound envelope → gateway decodes → registry authorization check →
//! state-machine mutation (persisted) → reply to the caller and fan-out to
//! other connections via the registry. Mutations are always durable before
//! any notification is attempted, so a dropped notification never loses
//! data, only timeliness.

pub mod auth;
pub mod conversation;
pub mod error;
pub mod friendship;
pub mod gateway;
pub mod keys;
pub mod model;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;

pub use error::{GatewayError, GatewayResult};
pub use server::{create_app, create_app_with_pool, AppState};
pub use session::SessionRegistry;
