//! REST identity provider (GoTrue-compatible `/auth/v1` API).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use clinic_config::IdentityConfig;
use clinic_core::AuthUser;

use crate::error::AuthError;
use crate::provider::IdentityProvider;
use crate::session::CachedSession;

pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Absolute expiry, seconds since epoch.
    #[serde(default)]
    expires_at: Option<i64>,
    /// Relative expiry, seconds from now.
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> CachedSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::TimeDelta::seconds(secs))
            });
        CachedSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user,
            expires_at,
        }
    }
}

impl HttpIdentityProvider {
    /// # Errors
    ///
    /// Returns `AuthError::NotConfigured` if the URL or API key is missing, or
    /// `AuthError::Other` if the HTTP client cannot be built.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, AuthError> {
        config.require()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AuthError::Other(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<CachedSession, AuthError> {
        let resp = self
            .client
            .post(format!("{}?grant_type={grant_type}", self.endpoint("token")))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let resp = check_status(resp).await?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("decode token response: {e}")))?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let resp = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| AuthError::Provider(format!("decode user: {e}")))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CachedSession, AuthError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedSession, AuthError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(resp).await?;
        Ok(())
    }
}

fn map_transport_error(e: reqwest::Error) -> AuthError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        AuthError::Unreachable(e.to_string())
    } else {
        AuthError::Provider(e.to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// Gateway and server failures mean the endpoint is effectively unreachable;
/// 4xx auth statuses are genuine rejections.
fn classify_status(status: StatusCode, body: &str) -> AuthError {
    let detail = format!("HTTP {status}: {body}");
    match status.as_u16() {
        400 | 401 | 403 | 422 => AuthError::Rejected(detail),
        408 | 429 | 500..=599 => AuthError::Unreachable(detail),
        _ => AuthError::Provider(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_taxonomy() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            AuthError::Rejected(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            AuthError::Rejected(_)
        ));
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_reachability());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_reachability());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            AuthError::Provider(_)
        ));
    }

    #[test]
    fn from_config_requires_url_and_key() {
        let result = HttpIdentityProvider::from_config(&IdentityConfig::default());
        assert!(matches!(result, Err(AuthError::NotConfigured(_))));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let provider = HttpIdentityProvider::from_config(&IdentityConfig {
            url: "https://auth.example.test/".into(),
            api_key: "anon".into(),
            ..IdentityConfig::default()
        })
        .unwrap();
        assert_eq!(provider.endpoint("user"), "https://auth.example.test/auth/v1/user");
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_at":1900000000,"expires_in":3600,"user":{"id":"u1","email":"a@b.test","role":"authenticated"}}"#,
        )
        .unwrap();
        let session = token.into_session();
        assert_eq!(session.expires_at.unwrap().timestamp(), 1_900_000_000);
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.refresh_token.as_deref(), Some("r"));
    }
}
