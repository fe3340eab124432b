//! Tool definitions and dispatch for the agent.

use crate::bigquery::{BigQueryToolset, TableRef};
use crate::error::{Result, SpendscopeError};
use crate::search::DocumentSearchTool;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use serde_json::Value;
use std::sync::Arc;

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// List dataset ids in a project.
    ListDatasetIds { project_id: Option<String> },

    /// Get dataset metadata.
    GetDatasetInfo {
        project_id: Option<String>,
        dataset_id: String,
    },

    /// List table ids in a dataset.
    ListTableIds {
        project_id: Option<String>,
        dataset_id: String,
    },

    /// Get table schema and metadata.
    GetTableInfo {
        project_id: Option<String>,
        dataset_id: String,
        table_id: String,
    },

    /// Run a read-only SQL query.
    ExecuteSql {
        project_id: Option<String>,
        query: String,
    },

    /// Ask a natural-language question about table data.
    AskDataInsights {
        project_id: Option<String>,
        user_query_with_context: String,
        table_references: Vec<TableRef>,
    },

    /// Search the document repository.
    SearchDocuments { query: String, page_size: Option<u32> },
}

/// The registered tool collections.
pub struct ToolContext {
    bigquery: Arc<BigQueryToolset>,
    search: Arc<DocumentSearchTool>,
}

impl ToolContext {
    pub fn new(bigquery: Arc<BigQueryToolset>, search: Arc<DocumentSearchTool>) -> Self {
        Self { bigquery, search }
    }

    pub fn bigquery(&self) -> &BigQueryToolset {
        &self.bigquery
    }

    /// Execute a tool call and return the result as a string.
    pub async fn execute(&self, tool: &ToolCall) -> Result<String> {
        let bq = &self.bigquery;
        match tool {
            ToolCall::ListDatasetIds { project_id } => Ok(bq.list_dataset_ids(project_id.as_deref()).await),
            ToolCall::GetDatasetInfo {
                project_id,
                dataset_id,
            } => Ok(bq.get_dataset_info(project_id.as_deref(), dataset_id).await),
            ToolCall::ListTableIds {
                project_id,
                dataset_id,
            } => Ok(bq.list_table_ids(project_id.as_deref(), dataset_id).await),
            ToolCall::GetTableInfo {
                project_id,
                dataset_id,
                table_id,
            } => Ok(bq
                .get_table_info(project_id.as_deref(), dataset_id, table_id)
                .await),
            ToolCall::ExecuteSql { project_id, query } => {
                Ok(bq.execute_sql(project_id.as_deref(), query).await)
            }
            ToolCall::AskDataInsights {
                project_id,
                user_query_with_context,
                table_references,
            } => Ok(bq
                .ask_data_insights(project_id.as_deref(), user_query_with_context, table_references)
                .await),
            ToolCall::SearchDocuments { query, page_size } => {
                self.search.search_documents(query, *page_size).await
            }
        }
    }
}

fn function(name: &str, description: &str, parameters: Value) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters: Some(parameters),
            strict: None,
        },
    }
}

/// Function/tool definitions sent to the model.
pub fn tool_definitions() -> Vec<ChatCompletionTool> {
    let project = serde_json::json!({
        "type": "string",
        "description": "Google Cloud project id (defaults to the configured project)"
    });

    vec![
        function(
            "list_dataset_ids",
            "List the BigQuery dataset ids in a project.",
            serde_json::json!({
                "type": "object",
                "properties": { "project_id": project }
            }),
        ),
        function(
            "get_dataset_info",
            "Get metadata about a BigQuery dataset.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": { "type": "string", "description": "The dataset id" }
                },
                "required": ["dataset_id"]
            }),
        ),
        function(
            "list_table_ids",
            "List the table ids in a BigQuery dataset.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": { "type": "string", "description": "The dataset id" }
                },
                "required": ["dataset_id"]
            }),
        ),
        function(
            "get_table_info",
            "Get the schema and metadata of a BigQuery table. \
             Use this to learn column names and types before writing SQL.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "dataset_id": { "type": "string", "description": "The dataset id" },
                    "table_id": { "type": "string", "description": "The table id" }
                },
                "required": ["dataset_id", "table_id"]
            }),
        ),
        function(
            "execute_sql",
            "Run a read-only GoogleSQL SELECT query and return the rows as JSON. \
             Statements other than SELECT are refused.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "query": { "type": "string", "description": "The GoogleSQL query" }
                },
                "required": ["query"]
            }),
        ),
        function(
            "ask_data_insights",
            "Ask a natural-language question about the data in BigQuery tables. \
             Returns the SQL used and the resulting rows.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "project_id": project,
                    "user_query_with_context": {
                        "type": "string",
                        "description": "The question, with any context needed to answer it"
                    },
                    "table_references": {
                        "type": "array",
                        "description": "Tables to use (defaults to the configured table)",
                        "items": {
                            "type": "object",
                            "properties": {
                                "projectId": { "type": "string" },
                                "datasetId": { "type": "string" },
                                "tableId": { "type": "string" }
                            },
                            "required": ["projectId", "datasetId", "tableId"]
                        }
                    }
                },
                "required": ["user_query_with_context"]
            }),
        ),
        function(
            "search_documents",
            "Search the document repository (contracts, policies, audit reports) \
             and return ranked excerpts. Use specific queries naming the vendors or \
             topics found in BigQuery.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query" },
                    "page_size": {
                        "type": "integer",
                        "description": "Maximum number of documents (default: 10)"
                    }
                },
                "required": ["query"]
            }),
        ),
    ]
}

fn required_str(args: &Value, key: &str) -> Result<String> {
    args[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SpendscopeError::Agent(format!("Missing '{}' argument", key)))
}

fn optional_str(args: &Value, key: &str) -> Option<String> {
    args[key].as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parse a tool call from the model's function-call format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: Value = if arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(arguments)
            .map_err(|e| SpendscopeError::Agent(format!("Invalid tool arguments: {}", e)))?
    };
    let project_id = optional_str(&args, "project_id");

    match name {
        "list_dataset_ids" => Ok(ToolCall::ListDatasetIds { project_id }),
        "get_dataset_info" => Ok(ToolCall::GetDatasetInfo {
            project_id,
            dataset_id: required_str(&args, "dataset_id")?,
        }),
        "list_table_ids" => Ok(ToolCall::ListTableIds {
            project_id,
            dataset_id: required_str(&args, "dataset_id")?,
        }),
        "get_table_info" => Ok(ToolCall::GetTableInfo {
            project_id,
            dataset_id: required_str(&args, "dataset_id")?,
            table_id: required_str(&args, "table_id")?,
        }),
        "execute_sql" => Ok(ToolCall::ExecuteSql {
            project_id,
            query: required_str(&args, "query")?,
        }),
        "ask_data_insights" => {
            let table_references = match args.get("table_references") {
                Some(Value::Null) | None => Vec::new(),
                Some(refs) => serde_json::from_value(refs.clone()).map_err(|e| {
                    SpendscopeError::Agent(format!("Invalid 'table_references': {}", e))
                })?,
            };
            Ok(ToolCall::AskDataInsights {
                project_id,
                user_query_with_context: required_str(&args, "user_query_with_context")?,
                table_references,
            })
        }
        "search_documents" => Ok(ToolCall::SearchDocuments {
            query: required_str(&args, "query")?,
            page_size: args["page_size"].as_u64().map(|n| n.min(u32::MAX as u64) as u32),
        }),
        _ => Err(SpendscopeError::Agent(format!("Unknown tool: {}", name))),
    }
}
