//! Friend Request Data Structures
//!
//! The pending-request relation is one logical record; these are its two
//! projections as seen from a given user, plus the friends-list summary
//! carrying the live presence flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::UserKey;

/// A pending request as seen by its recipient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomingRequest {
    pub from_user: UserKey,
    pub created_at: DateTime<Utc>,
}

/// A pending request as seen by its sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub to_user: UserKey,
    pub created_at: DateTime<Utc>,
}

/// Both projections for one user, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequests {
    pub received: Vec<IncomingRequest>,
    pub sent: Vec<OutgoingRequest>,
}

/// A friend entry with the live online flag from the session registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendSummary {
    pub user_id: UserKey,
    pub username: String,
    pub avatar_url: Option<String>,
    pub online: bool,
}
