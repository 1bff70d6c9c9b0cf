use async_trait::async_trait;

use clinic_auth::{AuthError, AuthSubscription, SessionBridge};
use clinic_core::{AuthUser, Credential};

pub type AuthCallback = Box<dyn Fn(Option<&AuthUser>) + Send + Sync>;

/// What the connection manager needs from the session layer.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Signed-in user at startup. Reachability failures are already absorbed.
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError>;

    /// Credential for the next `connect()`.
    async fn credential(&self) -> Result<Credential, AuthError>;

    /// Sign-in / sign-out notifications until the subscription is dropped.
    fn watch_auth(&self, callback: AuthCallback) -> AuthSubscription;
}

#[async_trait]
impl SessionSource for SessionBridge {
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        self.get_current_user().await
    }

    async fn credential(&self) -> Result<Credential, AuthError> {
        Self::credential(self).await
    }

    fn watch_auth(&self, callback: AuthCallback) -> AuthSubscription {
        self.on_auth_state_change(callback)
    }
}
