//! Error types for spendscope.

use thiserror::Error;

/// Library-level error type for spendscope operations.
#[derive(Error, Debug)]
pub enum SpendscopeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
    },

    #[error("BigQuery error: {0}")]
    BigQuery(String),

    #[error("Document search error: {0}")]
    Search(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for spendscope operations.
pub type Result<T> = std::result::Result<T, SpendscopeError>;
