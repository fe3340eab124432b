//! Fakes for the warehouse, search and model seams used across unit tests.

use crate::bigquery::{DryRun, QueryOutput, TableRef, Warehouse};
use crate::error::{Result, SpendscopeError};
use crate::llm::ChatModel;
use crate::search::{DocumentSearch, SearchHit};
use async_openai::types::{CreateChatCompletionRequest, CreateChatCompletionResponse};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Warehouse returning canned results and recording what ran.
pub struct FakeWarehouse {
    statement_type: String,
    rows: Vec<Map<String, Value>>,
    total_rows: Option<u64>,
    executed: Mutex<Vec<String>>,
    projects: Mutex<Vec<String>>,
}

impl FakeWarehouse {
    pub fn new(statement_type: &str, rows: Vec<Map<String, Value>>, total_rows: Option<u64>) -> Self {
        Self {
            statement_type: statement_type.to_string(),
            rows,
            total_rows,
            executed: Mutex::new(Vec::new()),
            projects: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn projects(&self) -> Vec<String> {
        self.projects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    async fn list_datasets(&self, project_id: &str) -> Result<Vec<String>> {
        self.projects.lock().unwrap().push(project_id.to_string());
        Ok(vec!["procurement".to_string()])
    }

    async fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<Value> {
        Ok(json!({ "datasetReference": { "projectId": project_id, "datasetId": dataset_id } }))
    }

    async fn list_tables(&self, _project_id: &str, _dataset_id: &str) -> Result<Vec<String>> {
        Ok(vec!["vendor_spend".to_string()])
    }

    async fn get_table(&self, table: &TableRef) -> Result<Value> {
        if table.table_id == "missing" {
            return Err(SpendscopeError::Api {
                service: "BigQuery".to_string(),
                status: 404,
                message: format!("Not found: Table {}", table),
            });
        }
        Ok(json!({
            "schema": { "fields": [
                { "name": "vendor", "type": "STRING" },
                { "name": "amount", "type": "NUMERIC" }
            ]}
        }))
    }

    async fn dry_run(&self, _project_id: &str, _sql: &str) -> Result<DryRun> {
        Ok(DryRun {
            statement_type: Some(self.statement_type.clone()),
            total_bytes_processed: Some(1024),
        })
    }

    async fn query(&self, _project_id: &str, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        self.executed.lock().unwrap().push(sql.to_string());
        let mut rows = self.rows.clone();
        rows.truncate(max_rows);
        Ok(QueryOutput {
            rows,
            total_rows: self.total_rows,
        })
    }
}

/// Search returning the same hits for every query.
pub struct FakeSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSearch for FakeSearch {
    async fn search(&self, query: &str, page_size: u32) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().take(page_size as usize).cloned().collect())
    }
}

/// Model replaying scripted responses in order.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<CreateChatCompletionResponse>>,
    requests: Mutex<Vec<CreateChatCompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<CreateChatCompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CreateChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// A final text answer.
    pub fn text(content: &str) -> CreateChatCompletionResponse {
        Self::response(json!({ "role": "assistant", "content": content }), "stop")
    }

    /// A turn requesting tool calls, given as `(id, name, arguments)`.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> CreateChatCompletionResponse {
        let calls: Vec<Value> = calls
            .iter()
            .map(|(id, name, arguments)| {
                json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": arguments }
                })
            })
            .collect();
        Self::response(
            json!({ "role": "assistant", "content": null, "tool_calls": calls }),
            "tool_calls",
        )
    }

    fn response(message: Value, finish_reason: &str) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1_760_000_000,
            "model": "google/gemini-3-pro-preview",
            "choices": [{ "index": 0, "message": message, "finish_reason": finish_reason }]
        }))
        .unwrap()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, request: CreateChatCompletionRequest) -> Result<CreateChatCompletionResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SpendscopeError::Llm("script exhausted".to_string()))
    }
}
