use thiserror::Error;

/// All errors surfaced by the gateway core.
///
/// Every handled failure replies to the caller with a stable machine-readable
/// code and a human-readable message; none of these close the connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required field is missing or malformed in an envelope.
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    /// Missing/invalid/expired token, or acting while unauthenticated.
    #[error("{message}")]
    Auth { message: String },

    /// A user/conversation/message key does not resolve.
    #[error("{message}")]
    NotFound {
        code: &'static str,
        message: String,
    },

    /// Caller lacks admin/participant/ownership rights for the mutation.
    #[error("{message}")]
    Permission { message: String },

    /// Duplicate friend request, already-friends, self-targeting and kin.
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    /// Underlying persistence operation failed.
    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    /// An external collaborator (credential hashing, token issuance) failed.
    #[error("{message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    /// Undecodable frame body; the loop continues after replying.
    pub fn bad_json() -> Self {
        Self::Validation {
            code: "BAD_JSON",
            message: "Invalid JSON".into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::auth("Please auth first")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn user_not_found() -> Self {
        Self::NotFound {
            code: "USER_NOT_FOUND",
            message: "User does not exist".into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn unknown_type(kind: &str) -> Self {
        Self::Validation {
            code: "UNKNOWN_TYPE",
            message: format!("Unknown type: {kind}"),
        }
    }

    /// Stable machine-readable code carried on the `error` event.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => code,
            Self::Auth { .. } => "UNAUTH",
            Self::NotFound { code, .. } => code,
            Self::Permission { .. } => "FORBIDDEN",
            Self::Conflict { code, .. } => code,
            Self::Store(_) => "STORE_ERROR",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(GatewayError::bad_json().code(), "BAD_JSON");
        assert_eq!(GatewayError::unauthenticated().code(), "UNAUTH");
        assert_eq!(GatewayError::user_not_found().code(), "USER_NOT_FOUND");
        assert_eq!(GatewayError::permission("no").code(), "FORBIDDEN");
        assert_eq!(
            GatewayError::conflict("ALREADY_FRIENDS", "already friends").code(),
            "ALREADY_FRIENDS"
        );
        assert_eq!(GatewayError::unknown_type("nope").code(), "UNKNOWN_TYPE");
    }

    #[test]
    fn test_store_errors_wrap() {
        let err: GatewayError = sqlx::Error::RowNotFound.into();
        assert_matches!(err, GatewayError::Store(_));
        assert_eq!(err.code(), "STORE_ERROR");
    }
}
