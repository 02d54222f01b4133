//! Message Data Structure
//!
//! A message is owned by its conversation: it is created only through the
//! conversation's insert operation and addressed by `(conversation, key)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::keys::{ConversationKey, MessageKey, UserKey};

/// Type of message content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::File => "file",
        }
    }

    /// Parse from storage; unknown values fall back to text.
    pub fn from_str(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "file" => MessageKind::File,
            _ => MessageKind::Text,
        }
    }
}

/// Metadata of an uploaded attachment, as returned by the upload service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    pub url: String,
    pub name: Option<String>,
    pub size: Option<i64>,
}

/// Per-recipient delivery/read state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Sent,
    Delivered,
    Read,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Sent => "sent",
            ReceiptStatus::Delivered => "delivered",
            ReceiptStatus::Read => "read",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(ReceiptStatus::Sent),
            "delivered" => Some(ReceiptStatus::Delivered),
            "read" => Some(ReceiptStatus::Read),
            _ => None,
        }
    }
}

/// One user's receipt on a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub updated_at: DateTime<Utc>,
}

/// A message in a conversation's log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageKey,
    pub conversation_id: ConversationKey,
    /// Position in the conversation's append-only log
    pub seq: i64,
    pub sender: UserKey,
    /// Optional when a file attachment is present
    pub text: Option<String>,
    #[serde(default)]
    pub kind: MessageKind,
    pub file: Option<FileMeta>,
    pub created_at: DateTime<Utc>,
    /// Receipts keyed by recipient
    #[serde(default)]
    pub receipts: HashMap<UserKey, Receipt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_storage_roundtrip() {
        for kind in [MessageKind::Text, MessageKind::Image, MessageKind::File] {
            assert_eq!(MessageKind::from_str(kind.as_str()), kind);
        }
        assert_eq!(MessageKind::from_str("unknown"), MessageKind::Text);
    }

    #[test]
    fn test_receipt_status_roundtrip() {
        for status in [
            ReceiptStatus::Sent,
            ReceiptStatus::Delivered,
            ReceiptStatus::Read,
        ] {
            assert_eq!(ReceiptStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ReceiptStatus::from_str("seen"), None);
    }

    #[test]
    fn test_message_serializes_receipts_as_map() {
        let user = UserKey::generate();
        let mut receipts = HashMap::new();
        receipts.insert(
            user,
            Receipt {
                status: ReceiptStatus::Read,
                updated_at: Utc::now(),
            },
        );
        let msg = StoredMessage {
            id: MessageKey::generate(),
            conversation_id: ConversationKey::generate(),
            seq: 1,
            sender: UserKey::generate(),
            text: Some("hi".into()),
            kind: MessageKind::Text,
            file: None,
            created_at: Utc::now(),
            receipts,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["receipts"][user.to_string()]["status"], "read");
    }
}
