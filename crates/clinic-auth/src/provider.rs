//! Identity-provider seam.
//!
//! The session bridge only needs these network calls. Cached-session lookup
//! and auth-state listeners live in the bridge itself.

use async_trait::async_trait;

use clinic_core::AuthUser;

use crate::error::AuthError;
use crate::session::CachedSession;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Strict server-side verification of an access token.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// Exchange email + password for a new session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CachedSession, AuthError>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<CachedSession, AuthError>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}
