//! Authentication
//!
//! The two external collaborators of the gateway core live here behind
//! small interfaces: the credential service (bcrypt) and the token service
//! (JWT access/refresh pairs), plus the REST handlers that use them.

pub mod credentials;
pub mod handlers;
pub mod tokens;

pub use handlers::{login, refresh, register};
