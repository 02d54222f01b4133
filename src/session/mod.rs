//! Live connection bookkeeping
//!
//! The session registry is the only process-wide mutable state: it maps
//! connections to authenticated users and to conversation rooms, and drives
//! all best-effort delivery to live sockets.

pub mod registry;

pub use registry::{ConnId, SessionRegistry};
