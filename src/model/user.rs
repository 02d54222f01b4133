//! User identity records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::UserKey;

/// A registered user as stored.
///
/// Not serializable on purpose: the credential hash must never reach the
/// wire. Outward-facing code goes through [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserKey,
    pub username: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Outward projection without the credential.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            user_id: self.id,
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// The shape of a user that goes over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub user_id: UserKey,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_projection_drops_credential() {
        let user = User {
            id: UserKey::generate(),
            username: "ada".into(),
            password_hash: "$2b$12$secret".into(),
            avatar_url: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(user.public()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }
}
