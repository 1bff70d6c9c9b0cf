use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated: sign in first")]
    NotAuthenticated,

    /// The identity provider could not be reached (no network, timeout, 5xx).
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),

    /// The provider answered and refused the credential.
    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("identity provider not configured: {0}")]
    NotConfigured(#[from] clinic_config::ConfigError),

    #[error("session store error: {0}")]
    SessionStore(String),

    /// The provider answered with something we could not use.
    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Network-reachability failures are recoverable with a cached session.
    #[must_use]
    pub const fn is_reachability(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Only rejections should send the user back to the sign-in screen.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::NotAuthenticated)
    }
}
