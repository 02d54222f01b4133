//! Typed event payloads
//!
//! Each WebSocket event decodes its `data` object into one of these before
//! touching a state machine. Decoding failures are non-fatal validation
//! errors.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::keys::{ConversationKey, MessageKey};
use crate::model::ReceiptStatus;

/// Decode an envelope's `data` into a typed payload.
///
/// A missing or null `data` decodes as an empty object, so events whose
/// fields are all optional accept a bare envelope.
pub fn decode<T: DeserializeOwned>(data: Option<Value>) -> GatewayResult<T> {
    let data = match data {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(value) => value,
    };
    serde_json::from_value(data)
        .map_err(|e| GatewayError::validation(format!("invalid payload: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub token: String,
}

/// `other_user_id` accepts a user key or a display name; resolution happens
/// at the boundary.
#[derive(Debug, Deserialize)]
pub struct DirectConversationRequest {
    pub other_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub conversation_id: ConversationKey,
}

#[derive(Debug, Deserialize)]
pub struct LoadMessagesRequest {
    pub conversation_id: ConversationKey,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: ConversationKey,
    /// Client-generated id, echoed back on the ack for reconciliation
    pub client_msg_id: String,
    #[serde(default)]
    pub msg_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub conversation_id: ConversationKey,
    pub message_id: MessageKey,
    pub status: ReceiptStatus,
}

#[derive(Debug, Deserialize)]
pub struct PinMessageRequest {
    pub conversation_id: ConversationKey,
    pub message_id: MessageKey,
}

#[derive(Debug, Deserialize)]
pub struct UnpinMessageRequest {
    pub conversation_id: ConversationKey,
}

#[derive(Debug, Deserialize)]
pub struct AcceptConversationRequest {
    pub conversation_id: ConversationKey,
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SendFriendRequestRequest {
    /// User key or display name of the target
    pub to_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondFriendRequestRequest {
    pub from_user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupMemberRequest {
    pub conversation_id: ConversationKey,
    pub member_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupInfoRequest {
    pub conversation_id: ConversationKey,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteConversationRequest {
    pub conversation_id: ConversationKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_send_message() {
        let req: SendMessageRequest = decode(Some(json!({
            "conversation_id": ConversationKey::generate(),
            "client_msg_id": "m1",
            "text": "hello",
        })))
        .unwrap();
        assert_eq!(req.client_msg_id, "m1");
        assert_eq!(req.text.as_deref(), Some("hello"));
        assert!(req.file_url.is_none());
    }

    #[test]
    fn test_decode_missing_field_is_validation_error() {
        let err = decode::<JoinRequest>(Some(json!({}))).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn test_decode_none_data() {
        // Required fields still fail without a payload...
        let err = decode::<JoinRequest>(None).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
        // ...but all-optional payloads accept a bare envelope.
        let req: SearchUsersRequest = decode(None).unwrap();
        assert_eq!(req.query, "");
        let req: SearchUsersRequest = decode(Some(json!({"query": "al"}))).unwrap();
        assert_eq!(req.query, "al");
    }

    #[test]
    fn test_decode_receipt_status() {
        let req: ReceiptRequest = decode(Some(json!({
            "conversation_id": ConversationKey::generate(),
            "message_id": MessageKey::generate(),
            "status": "read",
        })))
        .unwrap();
        assert_eq!(req.status, ReceiptStatus::Read);
    }
}
