//! Domain data structures
//!
//! - `User` / `PublicUser` - registered identities
//! - `Conversation` - direct and group conversations with the denormalized
//!   last-message cache
//! - `StoredMessage` - a message in a conversation's log, with receipts
//! - friend-request projections and friend summaries

pub mod conversation;
pub mod friend;
pub mod message;
pub mod user;

pub use conversation::{Conversation, ConversationKind, ConversationStatus, LastMessage};
pub use friend::{FriendRequests, FriendSummary, IncomingRequest, OutgoingRequest};
pub use message::{FileMeta, MessageKind, Receipt, ReceiptStatus, StoredMessage};
pub use user::{PublicUser, User};
