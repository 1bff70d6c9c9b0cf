use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinic_core::identity::{AuthUser, Credential};

use crate::error::AuthError;

/// Locally cached sign-in session.
///
/// Persisted by [`crate::session_store::SessionStore`] so the current user
/// survives restarts and can be served while the identity provider is
/// unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    /// Raw access JWT (handed to the sync connector).
    pub access_token: String,
    /// Refresh token, when the provider issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
    /// Access token expiry. `None` means "read it from the JWT".
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedSession {
    /// Credential for the sync connector.
    #[must_use]
    pub fn credential(&self) -> Credential {
        Credential {
            user: self.user.clone(),
            access_token: self.access_token.clone(),
        }
    }

    /// Expiry from the session, falling back to the JWT `exp` claim.
    #[must_use]
    pub fn effective_expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .or_else(|| decode_expiry(&self.access_token).ok())
    }

    /// Check if the token is expired or expires within `buffer_secs`.
    ///
    /// A token with no discoverable expiry is treated as not expiring.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        self.effective_expiry().is_some_and(|expires_at| {
            expires_at <= Utc::now() + chrono::TimeDelta::seconds(buffer_secs)
        })
    }
}

/// Decode JWT `exp` claim without signature validation (for quick expiry checks).
///
/// # Errors
///
/// Returns `AuthError::Other` if the JWT format is invalid or the `exp` claim
/// is missing or cannot be parsed.
pub fn decode_expiry(jwt: &str) -> Result<DateTime<Utc>, AuthError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Other("invalid JWT format".into()));
    }
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| AuthError::Other(format!("base64 decode failed: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| AuthError::Other(format!("JSON parse failed: {e}")))?;
    let exp = value["exp"]
        .as_i64()
        .ok_or_else(|| AuthError::Other("missing exp claim".into()))?;
    DateTime::from_timestamp(exp, 0).ok_or_else(|| AuthError::Other("invalid exp timestamp".into()))
}

#[cfg(test)]
pub(crate) fn make_jwt_with_exp(exp: i64) -> String {
    let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(format!(r#"{{"sub":"user_123","exp":{exp}}}"#));
    let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("fake_sig");
    format!("{header}.{payload}.{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_token(access_token: String) -> CachedSession {
        CachedSession {
            access_token,
            refresh_token: None,
            user: AuthUser::new("user_123"),
            expires_at: None,
        }
    }

    #[test]
    fn decode_expiry_valid_jwt() {
        let future_exp = Utc::now().timestamp() + 3600;
        let dt = decode_expiry(&make_jwt_with_exp(future_exp)).unwrap();
        assert_eq!(dt.timestamp(), future_exp);
    }

    #[test]
    fn decode_expiry_invalid_format() {
        let err = decode_expiry("not-a-jwt").unwrap_err();
        assert!(err.to_string().contains("invalid JWT format"));
    }

    #[test]
    fn decode_expiry_missing_exp_claim() {
        let header = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
        let payload =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"sub":"user_123"}"#);
        let jwt = format!("{header}.{payload}.sig");
        let err = decode_expiry(&jwt).unwrap_err();
        assert!(err.to_string().contains("missing exp claim"));
    }

    #[test]
    fn decode_expiry_bad_base64() {
        let err = decode_expiry("header.!!!invalid!!!.signature").unwrap_err();
        assert!(err.to_string().contains("base64 decode failed"));
    }

    #[test]
    fn near_expiry_reads_jwt_when_session_has_no_expiry() {
        let expired = session_with_token(make_jwt_with_exp(Utc::now().timestamp() - 10));
        assert!(expired.is_near_expiry(60));

        let fresh = session_with_token(make_jwt_with_exp(Utc::now().timestamp() + 3600));
        assert!(!fresh.is_near_expiry(60));
    }

    #[test]
    fn explicit_expiry_wins_over_jwt() {
        let mut session = session_with_token(make_jwt_with_exp(Utc::now().timestamp() + 3600));
        session.expires_at = Some(Utc::now() + chrono::TimeDelta::seconds(30));
        assert!(session.is_near_expiry(60));
    }

    #[test]
    fn opaque_token_never_near_expiry() {
        let session = session_with_token("opaque-token".into());
        assert!(session.effective_expiry().is_none());
        assert!(!session.is_near_expiry(60));
    }

    #[test]
    fn credential_carries_user_and_token() {
        let session = session_with_token("tok".into());
        let credential = session.credential();
        assert_eq!(credential.user.id, "user_123");
        assert_eq!(credential.access_token, "tok");
    }
}
