use std::sync::Arc;

use clinic_core::{AuthUser, Credential};

use crate::error::AuthError;
use crate::listeners::{AuthListeners, AuthSubscription};
use crate::provider::IdentityProvider;
use crate::session::CachedSession;
use crate::session_store::SessionStore;

/// Refresh the access token when it expires within this many seconds.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Current-user resolution with offline tolerance.
///
/// Wraps an [`IdentityProvider`] and a [`SessionStore`]. The cached session is
/// the source of truth for "who is signed in"; the provider is asked to
/// confirm it whenever it is reachable.
pub struct SessionBridge {
    provider: Arc<dyn IdentityProvider>,
    store: SessionStore,
    listeners: AuthListeners,
}

impl SessionBridge {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: SessionStore) -> Self {
        Self {
            provider,
            store,
            listeners: AuthListeners::new(),
        }
    }

    #[must_use]
    pub fn cached_session(&self) -> Option<CachedSession> {
        self.store.load()
    }

    /// Resolve the signed-in user.
    ///
    /// Verifies the cached access token with the provider first. If the
    /// provider cannot be reached, the cached user is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` when the provider refuses the token, and
    /// any non-reachability provider error unchanged.
    pub async fn get_current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        let Some(session) = self.store.load() else {
            return Ok(None);
        };
        match self.provider.get_user(&session.access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(error) if error.is_reachability() => {
                tracing::warn!(%error, user_id = %session.user.id, "identity provider unreachable; using cached user");
                Ok(Some(session.user))
            }
            Err(error) => Err(error),
        }
    }

    /// Register for sign-in / sign-out notifications.
    #[must_use = "dropping the subscription unregisters the callback"]
    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(Option<&AuthUser>) + Send + Sync + 'static,
    {
        self.listeners.subscribe(callback)
    }

    /// Persist a freshly issued session and notify listeners.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if the session cannot be persisted.
    pub fn sign_in(&self, session: &CachedSession) -> Result<(), AuthError> {
        self.store.store(session)?;
        tracing::info!(user_id = %session.user.id, "signed in");
        self.listeners.notify(Some(&session.user));
        Ok(())
    }

    /// Password grant against the provider, then [`Self::sign_in`].
    ///
    /// # Errors
    ///
    /// Propagates provider errors and session-store failures.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        let session = self.provider.sign_in_with_password(email, password).await?;
        self.sign_in(&session)?;
        Ok(session.user)
    }

    /// Clear the cached session and notify listeners.
    ///
    /// Server-side revocation is best effort; the local session is cleared
    /// even when the provider cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if the cached session cannot be removed.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.store.load()
            && let Err(error) = self.provider.sign_out(&session.access_token).await
        {
            tracing::warn!(%error, "remote sign-out failed; clearing local session anyway");
        }
        self.store.delete()?;
        tracing::info!("signed out");
        self.listeners.notify(None);
        Ok(())
    }

    /// Credential for the sync connector, refreshed when close to expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` with no cached session, and
    /// `AuthError::Rejected` if the provider refuses the refresh token.
    pub async fn credential(&self) -> Result<Credential, AuthError> {
        let session = self.store.load().ok_or(AuthError::NotAuthenticated)?;
        if !session.is_near_expiry(EXPIRY_BUFFER_SECS) {
            return Ok(session.credential());
        }
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::debug!(user_id = %session.user.id, "token near expiry but no refresh token");
            return Ok(session.credential());
        };

        match self.provider.refresh(refresh_token).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token.clone_from(&session.refresh_token);
                }
                self.store.store(&fresh)?;
                tracing::debug!(user_id = %fresh.user.id, "access token refreshed");
                Ok(fresh.credential())
            }
            Err(error) if error.is_reachability() => {
                tracing::warn!(%error, "token refresh unreachable; keeping cached token");
                Ok(session.credential())
            }
            Err(error) => Err(error),
        }
    }
}

