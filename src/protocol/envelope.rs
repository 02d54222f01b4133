//! Gateway envelopes
//!
//! Client frames are `{type, data, request_id}`; server frames add `ts`
//! (epoch milliseconds) and echo `request_id` when the triggering request
//! carried one. `data` stays a JSON object here; individual events decode it
//! into the typed payloads in [`super::requests`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// Server epoch-millisecond timestamp, the `ts` field of every outbound frame.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// One inbound frame from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
}

impl ClientEnvelope {
    /// Parse a raw text frame. Failure is the non-fatal `BAD_JSON` case.
    pub fn parse(raw: &str) -> GatewayResult<Self> {
        serde_json::from_str(raw).map_err(|_| GatewayError::bad_json())
    }
}

/// One outbound frame to a client.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub request_id: Option<String>,
    pub ts: i64,
}

impl ServerEnvelope {
    pub fn new(kind: &str, data: Value, request_id: Option<&str>) -> Self {
        Self {
            kind: kind.to_string(),
            data,
            request_id: request_id.map(str::to_string),
            ts: now_ms(),
        }
    }

    /// The structured `error` event for a handled failure.
    pub fn error(err: &GatewayError, request_id: Option<&str>) -> Self {
        Self::new(
            events::ERROR,
            serde_json::json!({
                "code": err.code(),
                "message": err.to_string(),
            }),
            request_id,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // A Value always serializes; keep a fallback frame anyway.
            format!(r#"{{"type":"error","data":{{"code":"STORE_ERROR"}},"ts":{}}}"#, now_ms())
        })
    }
}

/// Server→client event names.
pub mod events {
    pub const ERROR: &str = "error";
    pub const AUTH_OK: &str = "auth_ok";
    pub const PRESENCE_UPDATE: &str = "presence_update";
    pub const DIRECT_CONVERSATION: &str = "direct_conversation";
    pub const NEW_CONVERSATION: &str = "new_conversation";
    pub const CONVERSATIONS_LIST: &str = "conversations_list";
    pub const CONVERSATION_ACCEPTED: &str = "conversation_accepted";
    pub const CONVERSATION_UPDATED: &str = "conversation_updated";
    pub const CONVERSATION_DELETED: &str = "conversation_deleted";
    pub const JOIN_OK: &str = "join_ok";
    pub const MESSAGES_LOADED: &str = "messages_loaded";
    pub const SEND_ACK: &str = "send_ack";
    pub const NEW_MESSAGE: &str = "new_message";
    pub const RECEIPT_UPDATE: &str = "receipt_update";
    pub const PINNED_MESSAGE_UPDATED: &str = "pinned_message_updated";
    pub const SEARCH_RESULTS: &str = "search_results";
    pub const FRIEND_REQUEST_SENT: &str = "friend_request_sent";
    pub const FRIEND_REQUEST_RECEIVED: &str = "friend_request_received";
    pub const FRIEND_REQUEST_ACCEPTED: &str = "friend_request_accepted";
    pub const FRIEND_REQUEST_REJECTED: &str = "friend_request_rejected";
    pub const FRIEND_ACCEPTED: &str = "friend_accepted";
    pub const FRIEND_REJECTED: &str = "friend_rejected";
    pub const FRIENDS_LIST: &str = "friends_list";
    pub const FRIEND_REQUESTS: &str = "friend_requests";
    pub const GROUP_CREATED: &str = "group_created";
    pub const GROUP_UPDATED: &str = "group_updated";
    pub const GROUP_INFO_UPDATED: &str = "group_info_updated";
    pub const MEMBER_ADDED: &str = "member_added";
    pub const MEMBER_REMOVED: &str = "member_removed";
    pub const REMOVED_FROM_GROUP: &str = "removed_from_group";
}
