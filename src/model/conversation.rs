//! Conversation Data Structure
//!
//! Represents a direct or group conversation, including the denormalized
//! last-message cache that conversation lists are sorted by.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::{ConversationKey, MessageKey, UserKey};

/// Kind of conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Two-party conversation, uniquely keyed by its sorted participant pair
    Direct,
    /// Named multi-party conversation with admins
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationKind::Direct => "direct",
            ConversationKind::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(ConversationKind::Direct),
            "group" => Some(ConversationKind::Group),
            _ => None,
        }
    }
}

/// Consent state of a conversation
///
/// Direct conversations start `Pending` unless the participants are already
/// friends; groups are always `Accepted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Pending,
    Accepted,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Pending => "pending",
            ConversationStatus::Accepted => "accepted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConversationStatus::Pending),
            "accepted" => Some(ConversationStatus::Accepted),
            _ => None,
        }
    }
}

/// Denormalized cache of the most recent message, refreshed on every insert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    pub text: Option<String>,
    pub sender: UserKey,
    pub created_at: DateTime<Utc>,
}

/// A conversation between users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation key
    pub id: ConversationKey,
    pub kind: ConversationKind,
    /// Participant user keys
    pub participants: Vec<UserKey>,
    pub status: ConversationStatus,
    /// User who created a direct conversation (drives the consent flow)
    pub initiator: Option<UserKey>,
    /// Group name
    pub name: Option<String>,
    /// Group avatar reference
    pub avatar_url: Option<String>,
    /// Group admins (subset of participants, never empty for groups)
    pub admins: Vec<UserKey>,
    /// Group creator; immutable and never removable from participants
    pub created_by: Option<UserKey>,
    /// Reference into this conversation's own message log
    pub pinned_message: Option<MessageKey>,
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Check if user is a participant
    pub fn has_participant(&self, user: UserKey) -> bool {
        self.participants.contains(&user)
    }

    /// Check if user is an admin (groups only; always false for direct)
    pub fn is_admin(&self, user: UserKey) -> bool {
        self.admins.contains(&user)
    }

    /// Get the other participant (for direct conversations)
    pub fn other_participant(&self, current: UserKey) -> Option<UserKey> {
        self.participants.iter().find(|&&id| id != current).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [ConversationKind::Direct, ConversationKind::Group] {
            assert_eq!(ConversationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::from_str("channel"), None);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [ConversationStatus::Pending, ConversationStatus::Accepted] {
            assert_eq!(ConversationStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_other_participant() {
        let a = UserKey::generate();
        let b = UserKey::generate();
        let conv = Conversation {
            id: ConversationKey::generate(),
            kind: ConversationKind::Direct,
            participants: vec![a, b],
            status: ConversationStatus::Pending,
            initiator: Some(a),
            name: None,
            avatar_url: None,
            admins: vec![],
            created_by: None,
            pinned_message: None,
            last_message: None,
            created_at: Utc::now(),
        };
        assert_eq!(conv.other_participant(a), Some(b));
        assert_eq!(conv.other_participant(b), Some(a));
        assert!(conv.has_participant(a));
        assert!(!conv.is_admin(a));
    }
}
