use serde::{Deserialize, Serialize};

/// Lightweight authenticated user identity for cross-crate passing.
///
/// Produced by `clinic-auth`, consumed by `clinic-sync` and `clinic-db`.
/// Contains only data fields, no provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Identity-provider user ID (JWT `sub` claim).
    pub id: String,
    /// Primary email address, when the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// Access credential supplied to the sync connector.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: AuthUser,
    /// Raw bearer token (JWT).
    pub access_token: String,
}

// Hand-written so the token never lands in logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn credential_debug_redacts_token() {
        let credential = Credential {
            user: AuthUser::new("user_1"),
            access_token: "secret.jwt.value".into(),
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("user_1"));
        assert!(!rendered.contains("secret.jwt.value"));
    }

    #[test]
    fn auth_user_deserializes_without_email() {
        let user: AuthUser = serde_json::from_str(r#"{"id":"user_2"}"#).unwrap();
        assert_eq!(user, AuthUser::new("user_2"));
    }
}
