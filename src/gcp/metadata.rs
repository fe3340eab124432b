//! Google Cloud compute metadata server.

use super::token::TokenResponse;
use crate::error::{Result, SpendscopeError};
use std::time::Duration;

const DEFAULT_HOST: &str = "metadata.google.internal";

/// Short timeout for the availability probe so off-cloud startup stays fast.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Client for the metadata server of the current VM or container.
#[derive(Clone)]
pub struct MetadataServer {
    http: reqwest::Client,
    base: String,
}

impl MetadataServer {
    /// `host` overrides the default host (from `GCE_METADATA_HOST`).
    pub fn new(http: reqwest::Client, host: Option<&str>) -> Self {
        Self {
            http,
            base: format!("http://{}/computeMetadata/v1", host.unwrap_or(DEFAULT_HOST)),
        }
    }

    /// Whether a metadata server answers on this host.
    pub async fn is_available(&self) -> bool {
        let response = self
            .http
            .get(format!("{}/", self.base))
            .header("Metadata-Flavor", "Google")
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(r) => r
                .headers()
                .get("Metadata-Flavor")
                .is_some_and(|v| v == "Google"),
            Err(_) => false,
        }
    }

    /// Project the VM or container runs in.
    pub async fn project_id(&self) -> Result<String> {
        let text = self.get("project/project-id").await?.text().await?;
        Ok(text.trim().to_string())
    }

    /// Access token of the attached default service account.
    pub async fn token(&self) -> Result<TokenResponse> {
        let response = self
            .get("instance/service-accounts/default/token")
            .await?;
        Ok(response.json::<TokenResponse>().await?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let response = self
            .http
            .get(format!("{}/{}", self.base, path))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SpendscopeError::Credentials(format!(
                "metadata server returned {} for {}",
                response.status().as_u16(),
                path
            )));
        }
        Ok(response)
    }
}
