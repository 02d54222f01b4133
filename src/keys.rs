//! Opaque entity keys
//!
//! Every entity in the gateway is addressed by a typed key wrapping a UUID.
//! Parsing happens once at the boundary; everywhere else the keys are opaque.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! key_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random key.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

key_type!(
    /// Identity key of a registered user.
    UserKey
);
key_type!(
    /// Key of a conversation document.
    ConversationKey
);
key_type!(
    /// Key of a message within a conversation.
    MessageKey
);

/// Order a user pair canonically (ascending by key).
///
/// Direct conversations and friendships are keyed on the unordered pair, so
/// every lookup and insert goes through this first.
pub fn ordered_pair(a: UserKey, b: UserKey) -> (UserKey, UserKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Dedup key for a direct conversation: the sorted pair joined with `:`.
pub fn direct_pair_key(a: UserKey, b: UserKey) -> String {
    let (lo, hi) = ordered_pair(a, b);
    format!("{}:{}", lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let key = UserKey::generate();
        let parsed: UserKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-key".parse::<ConversationKey>().is_err());
    }

    #[test]
    fn test_ordered_pair_is_symmetric() {
        let a = UserKey::generate();
        let b = UserKey::generate();
        assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
    }

    #[test]
    fn test_pair_key_is_symmetric() {
        let a = UserKey::generate();
        let b = UserKey::generate();
        assert_eq!(direct_pair_key(a, b), direct_pair_key(b, a));
        assert_ne!(direct_pair_key(a, b), direct_pair_key(a, a));
    }

    #[test]
    fn test_serde_transparent() {
        let key = MessageKey::generate();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", key));
        let back: MessageKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }
}
