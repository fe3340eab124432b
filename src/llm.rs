//! Chat model access through Vertex AI's OpenAI-compatible endpoint.

use crate::error::{Result, SpendscopeError};
use crate::gcp::TokenProvider;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateChatCompletionRequest, CreateChatCompletionResponse};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: CreateChatCompletionRequest) -> Result<CreateChatCompletionResponse>;
}

/// Gemini served by Vertex AI, authenticated with Google credentials.
pub struct VertexChatModel {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_base: String,
}

impl VertexChatModel {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        project_id: &str,
        location: &str,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: vertex_api_base(project_id, location),
        }
    }

    /// Tokens expire, so the client is rebuilt with a current token per call.
    async fn client(&self) -> Result<Client<OpenAIConfig>> {
        let token = self.tokens.access_token().await?;
        let config = OpenAIConfig::new()
            .with_api_base(self.api_base.clone())
            .with_api_key(token);
        Ok(Client::with_config(config).with_http_client(self.http.clone()))
    }
}

#[async_trait]
impl ChatModel for VertexChatModel {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn chat(&self, request: CreateChatCompletionRequest) -> Result<CreateChatCompletionResponse> {
        debug!("Sending {} messages", request.messages.len());
        self.client()
            .await?
            .chat()
            .create(request)
            .await
            .map_err(|e| SpendscopeError::Llm(e.to_string()))
    }
}

/// Base URL of the OpenAI-compatible endpoint for a project and location.
pub fn vertex_api_base(project_id: &str, location: &str) -> String {
    let host = if location == "global" {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{}-aiplatform.googleapis.com", location)
    };
    format!(
        "https://{}/v1/projects/{}/locations/{}/endpoints/openapi",
        host, project_id, location
    )
}

/// Model id as the endpoint expects it: `publisher/model`.
pub fn vertex_model_id(model_name: &str) -> String {
    if model_name.contains('/') {
        model_name.to_string()
    } else {
        format!("google/{}", model_name)
    }
}
