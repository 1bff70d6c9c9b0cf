//! # clinic-auth
//!
//! Current-user resolution for the clinic sync subsystem.
//!
//! [`SessionBridge`] verifies the cached session against an
//! [`IdentityProvider`] and falls back to the cached user while the provider
//! is unreachable. Sessions persist in the OS keychain (`keyring`) with a
//! 0600 file fallback. [`HttpIdentityProvider`] talks to a GoTrue-style REST
//! API over `reqwest`.

pub mod bridge;
pub mod error;
pub mod http;
pub mod listeners;
pub mod provider;
pub mod session;
pub mod session_store;

pub use bridge::SessionBridge;
pub use error::AuthError;
pub use http::HttpIdentityProvider;
pub use listeners::{AuthListeners, AuthSubscription};
pub use provider::IdentityProvider;
pub use session::CachedSession;
pub use session_store::SessionStore;

/// Bridge over the HTTP provider and keyring store named by the config.
///
/// # Errors
///
/// Returns `AuthError::NotConfigured` when the identity URL or API key is
/// missing, or `AuthError::SessionStore` if no session fallback path resolves.
pub fn from_config(config: &clinic_config::IdentityConfig) -> Result<SessionBridge, AuthError> {
    let provider = HttpIdentityProvider::from_config(config)?;
    let store = SessionStore::from_config(config)?;
    Ok(SessionBridge::new(std::sync::Arc::new(provider), store))
}
