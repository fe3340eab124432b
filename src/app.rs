//! Application assembly: credentials, deployment values, tools and agent.

use crate::agent::{Agent, ToolContext};
use crate::bigquery::{BigQueryClient, BigQueryToolConfig, BigQueryToolset, DataInsights, TableRef};
use crate::config::{Deployment, EnvVars, Prompts, Settings};
use crate::error::Result;
use crate::gcp::{http_client_with_timeout, Credentials, TokenProvider};
use crate::llm::{vertex_model_id, VertexChatModel};
use crate::search::{DataStorePath, DiscoveryEngineSearch, DocumentSearchTool};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Name the agent is registered under.
pub const AGENT_NAME: &str = "spend_analyst";

/// The assembled application.
pub struct App {
    pub name: String,
    pub agent: Arc<Agent>,
    pub deployment: Deployment,
}

impl App {
    /// Discover credentials, resolve the deployment and build the app.
    pub async fn from_env(settings: &Settings, env: &EnvVars) -> Result<Self> {
        let http = http_client_with_timeout(Duration::from_secs(settings.model.timeout_secs))?;
        let credentials = Credentials::discover(env, http).await?;
        info!(
            "Using {} credentials from {} for project {}",
            credentials.kind, credentials.source, credentials.project_id
        );

        let deployment = Deployment::resolve(env, &credentials.project_id);
        Self::build(settings, deployment, credentials.token_provider())
    }

    /// Build the app for a resolved deployment.
    ///
    /// Fails when the dataset, table or datastore is not configured.
    pub fn build(
        settings: &Settings,
        deployment: Deployment,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let dataset_id = deployment.dataset_id()?;
        let table_id = deployment.table_id()?;
        let datastore: DataStorePath = deployment.datastore_path()?.parse()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let instruction = prompts.build_instruction(&deployment, chrono::Local::now().date_naive())?;

        let http = http_client_with_timeout(Duration::from_secs(settings.model.timeout_secs))?;
        let model_id = vertex_model_id(&deployment.model_name);
        let model = Arc::new(VertexChatModel::new(
            http.clone(),
            Arc::clone(&tokens),
            &deployment.project_id,
            &settings.model.location,
        ));

        let warehouse = Arc::new(BigQueryClient::new(
            http.clone(),
            Arc::clone(&tokens),
            &deployment.bq_location,
            settings.bigquery.query_timeout_ms,
        ));
        let bigquery = BigQueryToolset::new(
            warehouse,
            BigQueryToolConfig::read_only(settings.bigquery.max_query_result_rows),
            &deployment.project_id,
        )
        .with_default_table(TableRef::new(&deployment.project_id, dataset_id, table_id))
        .with_insights(DataInsights::new(model.clone(), &model_id, prompts));

        let search = DocumentSearchTool::new(
            Arc::new(DiscoveryEngineSearch::new(
                http,
                tokens,
                datastore,
                settings.search.extractive_answers,
            )),
            settings.search.page_size,
        );

        let tools = ToolContext::new(Arc::new(bigquery), Arc::new(search));
        let agent = Agent::new(AGENT_NAME, model, &model_id, instruction, tools)
            .with_temperature(settings.model.temperature)
            .with_max_iterations(settings.model.max_iterations);

        info!(
            "Built agent {} with model {} over {}.{}",
            AGENT_NAME, model_id, dataset_id, table_id
        );

        Ok(Self {
            name: AGENT_NAME.to_string(),
            agent: Arc::new(agent),
            deployment,
        })
    }
}
