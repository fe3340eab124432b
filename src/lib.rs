//! Spendscope - vendor spend compliance analyst
//!
//! An LLM agent that investigates vendor spend by pairing structured
//! transaction data in BigQuery with unstructured contracts, policies and
//! audit reports indexed in Vertex AI Search.
//!
//! # Architecture
//!
//! - `gcp` - Application Default Credentials, access tokens, REST client
//! - `config` - File settings, deployment values from the environment, prompts
//! - `bigquery` - Read-only BigQuery toolset (schema, SQL, data insights)
//! - `search` - Document search over a Vertex AI Search datastore
//! - `llm` - Gemini through Vertex AI's OpenAI-compatible endpoint
//! - `agent` - Tool-calling loop and chat sessions
//! - `app` - Assembly of the above into a runnable agent
//!
//! # Example
//!
//! ```rust,no_run
//! use spendscope::app::App;
//! use spendscope::config::{EnvVars, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let app = App::from_env(&settings, &EnvVars::from_process()).await?;
//!
//!     let response = app.agent.run("Which vendors exceeded their contract value?").await?;
//!     println!("{}", response.content);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod app;
pub mod bigquery;
pub mod cli;
pub mod config;
pub mod error;
pub mod gcp;
pub mod llm;
pub mod search;

#[cfg(test)]
mod test_support;

pub use error::{Result, SpendscopeError};
