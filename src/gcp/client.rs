//! Authorized JSON client for Google REST APIs.

use super::token::TokenProvider;
use crate::error::{Result, SpendscopeError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default timeout for Google API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create the shared HTTP client with the default timeout.
pub fn http_client() -> Result<reqwest::Client> {
    http_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create the shared HTTP client with a custom timeout.
pub fn http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("spendscope/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// JSON client for one Google service, authenticated per request.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    service: &'static str,
}

impl GoogleClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenProvider>, service: &'static str) -> Self {
        Self {
            http,
            tokens,
            service,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send(self.http.get(url)).await
    }

    pub async fn post<B, T>(&self, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.http.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let token = self.tokens.access_token().await?;
        let mut request = request.bearer_auth(token);
        if let Some(project) = self.tokens.quota_project() {
            request = request.header("x-goog-user-project", project);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpendscopeError::Api {
                service: self.service.to_string(),
                status: status.as_u16(),
                message: google_error_message(&body),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// Extract the human-readable message from a Google error body.
pub fn google_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_error_message() {
        let body = r#"{"error": {"code": 403, "message": "Access Denied: Table acme:procurement.vendor_spend", "status": "PERMISSION_DENIED"}}"#;
        assert_eq!(
            google_error_message(body),
            "Access Denied: Table acme:procurement.vendor_spend"
        );
    }

    #[test]
    fn test_google_error_message_plain_body() {
        assert_eq!(google_error_message(" upstream timeout \n"), "upstream timeout");
    }
}
