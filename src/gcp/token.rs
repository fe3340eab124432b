//! OAuth2 access tokens for Google APIs.

use super::credentials::{AuthorizedUserKey, ServiceAccountKey};
use super::metadata::MetadataServer;
use crate::error::{Result, SpendscopeError};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// OAuth scope covering BigQuery, Discovery Engine and Vertex AI.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for Google API calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a valid access token, refreshing it if needed.
    async fn access_token(&self) -> Result<String>;

    /// Project billed for quota, sent as `x-goog-user-project`.
    fn quota_project(&self) -> Option<&str> {
        None
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Single-slot token cache shared by the refreshing providers.
#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TokenResponse>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if Instant::now() + REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let response = fetch().await?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(3600));
        *slot = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!("Refreshed access token (valid for {}s)", lifetime.as_secs());
        Ok(response.access_token)
    }
}

/// A pre-minted token that never refreshes.
pub struct StaticToken {
    token: String,
    quota_project: Option<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            quota_project: None,
        }
    }

    pub fn with_quota_project(mut self, project: impl Into<String>) -> Self {
        self.quota_project = Some(project.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    fn quota_project(&self) -> Option<&str> {
        self.quota_project.as_deref()
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Tokens minted from a service account key via the JWT bearer grant.
pub struct ServiceAccountTokens {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    cache: TokenCache,
}

impl ServiceAccountTokens {
    /// Fails when the key's `private_key` is not an RSA PEM.
    pub fn new(http: reqwest::Client, key: ServiceAccountKey) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SpendscopeError::Credentials(format!(
                "invalid private key for service account {}: {}",
                key.client_email, e
            ))
        })?;
        Ok(Self {
            http,
            key,
            signing_key,
            cache: TokenCache::default(),
        })
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn assertion(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: self.token_uri(),
            iat: now,
            exp: now + 3600,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        Ok(jsonwebtoken::encode(&header, &claims, &self.signing_key)?)
    }

    async fn fetch(&self) -> Result<TokenResponse> {
        let assertion = self.assertion()?;
        let response = self
            .http
            .post(self.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        read_token_response(response).await
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokens {
    #[instrument(skip(self), fields(account = %self.key.client_email))]
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }
}

/// Tokens refreshed from end-user credentials written by
/// `gcloud auth application-default login`.
pub struct UserTokens {
    http: reqwest::Client,
    key: AuthorizedUserKey,
    cache: TokenCache,
}

impl UserTokens {
    pub fn new(http: reqwest::Client, key: AuthorizedUserKey) -> Self {
        Self {
            http,
            key,
            cache: TokenCache::default(),
        }
    }

    async fn fetch(&self) -> Result<TokenResponse> {
        let token_uri = self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let response = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.key.client_id.as_str()),
                ("client_secret", self.key.client_secret.as_str()),
                ("refresh_token", self.key.refresh_token.as_str()),
            ])
            .send()
            .await?;
        read_token_response(response).await
    }
}

#[async_trait]
impl TokenProvider for UserTokens {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    fn quota_project(&self) -> Option<&str> {
        self.key.quota_project_id.as_deref()
    }
}

/// Tokens for the attached service account on Google Cloud compute.
pub struct MetadataTokens {
    server: MetadataServer,
    cache: TokenCache,
}

impl MetadataTokens {
    pub fn new(server: MetadataServer) -> Self {
        Self {
            server,
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl TokenProvider for MetadataTokens {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.server.token()).await
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SpendscopeError::Credentials(format!(
            "token exchange failed ({}): {}",
            status.as_u16(),
            body.trim()
        )));
    }
    Ok(response.json::<TokenResponse>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("ya29.test").with_quota_project("acme-billing");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.test");
        assert_eq!(provider.quota_project(), Some("acme-billing"));
    }

    #[tokio::test]
    async fn test_cache_reuses_fresh_token() {
        let cache = TokenCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let token = cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(TokenResponse {
                        access_token: "fresh".to_string(),
                        expires_in: Some(3600),
                    })
                })
                .await
                .unwrap();
            assert_eq!(token, "fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_refreshes_near_expiry() {
        let cache = TokenCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_fetch(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(TokenResponse {
                        access_token: "short".to_string(),
                        expires_in: Some(30),
                    })
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_token_response_without_expiry() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "token_type": "Bearer"}"#).unwrap();
        assert_eq!(response.access_token, "abc");
        assert!(response.expires_in.is_none());
    }
}
