//! Configuration module for spendscope.
//!
//! Handles file settings, environment-derived deployment values and prompt templates.

mod deployment;
mod prompts;
mod settings;

pub use deployment::{
    datastore_resource_path, Deployment, EnvVars, BQ_DATASET_ID, BQ_LOCATION, BQ_TABLE_ID,
    DATA_STORE_ID, DATA_STORE_REGION, DEFAULT_BQ_LOCATION, DEFAULT_DATA_STORE_REGION,
    DEFAULT_MODEL_NAME, MODEL_NAME, VERTEX_AI_SEARCH_DATASTORE,
};
pub use prompts::{AgentPrompts, InsightsPrompts, Prompts};
pub use settings::{
    BigQuerySettings, GeneralSettings, ModelSettings, PromptSettings, SearchSettings,
    ServerSettings, Settings,
};
