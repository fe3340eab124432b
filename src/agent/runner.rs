//! Agent runner with tool calling loop.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::error::{Result, SpendscopeError};
use crate::llm::ChatModel;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Agent that answers questions using the BigQuery and document tools.
pub struct Agent {
    name: String,
    model: Arc<dyn ChatModel>,
    model_id: String,
    instruction: String,
    tools: ToolContext,
    temperature: f32,
    max_iterations: usize,
}

impl Agent {
    pub fn new(
        name: &str,
        model: Arc<dyn ChatModel>,
        model_id: &str,
        instruction: String,
        tools: ToolContext,
    ) -> Self {
        Self {
            name: name.to_string(),
            model,
            model_id: model_id.to_string(),
            instruction,
            tools,
            temperature: 0.1,
            max_iterations: 15,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &ToolContext {
        &self.tools
    }

    /// Answer a single question with a fresh history.
    pub async fn run(&self, question: &str) -> Result<AgentResponse> {
        let mut messages = vec![self.system_message()?];
        messages.push(user_message(question)?);
        self.complete(&mut messages).await
    }

    fn system_message(&self) -> Result<ChatCompletionRequestMessage> {
        Ok(ChatCompletionRequestSystemMessageArgs::default()
            .content(self.instruction.clone())
            .build()
            .map_err(|e| SpendscopeError::Agent(e.to_string()))?
            .into())
    }

    /// Drive the model until it answers without tool calls.
    #[instrument(skip_all, fields(agent = %self.name))]
    async fn complete(&self, messages: &mut Vec<ChatCompletionRequestMessage>) -> Result<AgentResponse> {
        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(SpendscopeError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let request = CreateChatCompletionRequestArgs::default()
                .model(&self.model_id)
                .messages(messages.clone())
                .tools(tool_definitions())
                .temperature(self.temperature)
                .build()
                .map_err(|e| SpendscopeError::Agent(e.to_string()))?;

            let response = self.model.chat(request).await?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| SpendscopeError::Agent("No response from model".to_string()))?;

            let tool_calls = match &choice.message.tool_calls {
                Some(calls) if !calls.is_empty() => calls,
                _ => {
                    let content = choice.message.content.clone().unwrap_or_default();
                    messages.push(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(content.clone())
                            .build()
                            .map_err(|e| SpendscopeError::Agent(e.to_string()))?
                            .into(),
                    );
                    return Ok(AgentResponse {
                        content,
                        tool_calls: tool_calls_made,
                        iterations,
                    });
                }
            };

            let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(tool_calls.clone())
                .build()
                .map_err(|e| SpendscopeError::Agent(e.to_string()))?;
            messages.push(assistant_msg.into());

            // Results are appended in call order regardless of completion order.
            let records = join_all(tool_calls.iter().map(|call| self.execute_tool_call(call))).await;

            for (tool_call, record) in tool_calls.iter().zip(records) {
                let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(&tool_call.id)
                    .content(record.result.clone())
                    .build()
                    .map_err(|e| SpendscopeError::Agent(e.to_string()))?;
                messages.push(tool_msg.into());

                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, tool_call: &ChatCompletionMessageToolCall) -> ToolCallRecord {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        let result = match parse_tool_call(name, arguments) {
            Ok(tool) => match self.tools.execute(&tool).await {
                Ok(output) => output,
                Err(e) => {
                    warn!("Tool {} failed: {}", name, e);
                    format!("Tool error: {}", e)
                }
            },
            Err(e) => format!("Failed to parse tool call: {}", e),
        };

        ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        }
    }
}

fn user_message(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content.to_string())
        .build()
        .map_err(|e| SpendscopeError::Agent(e.to_string()))?
        .into())
}

/// A multi-turn conversation with an agent.
pub struct ChatSession {
    agent: Arc<Agent>,
    messages: Vec<ChatCompletionRequestMessage>,
}

impl ChatSession {
    pub fn new(agent: Arc<Agent>) -> Result<Self> {
        let messages = vec![agent.system_message()?];
        Ok(Self { agent, messages })
    }

    /// Send a message, keeping the exchange in the history.
    ///
    /// A failed turn leaves the history as it was before the message.
    pub async fn send(&mut self, message: &str) -> Result<AgentResponse> {
        let checkpoint = self.messages.len();
        self.messages.push(user_message(message)?);

        let result = self.agent.complete(&mut self.messages).await;
        if result.is_err() {
            self.messages.truncate(checkpoint);
        }
        result
    }

    /// Forget everything but the instruction.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    /// Number of messages after the instruction.
    pub fn len(&self) -> usize {
        self.messages.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: String,
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::{BigQueryToolConfig, BigQueryToolset};
    use crate::search::{DocumentSearchTool, SearchHit};
    use crate::test_support::{FakeSearch, FakeWarehouse, ScriptedModel};
    use async_openai::types::ChatCompletionRequestMessage as Message;
    use serde_json::{json, Map, Value};

    fn vendor_row() -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("vendor".to_string(), json!("Globex"));
        row.insert("amount".to_string(), json!(182000.0));
        row
    }

    fn agent(
        model: Arc<ScriptedModel>,
        warehouse: Arc<FakeWarehouse>,
        search: Arc<FakeSearch>,
    ) -> Agent {
        let bigquery = BigQueryToolset::new(warehouse, BigQueryToolConfig::read_only(50), "acme-prod");
        let tools = ToolContext::new(Arc::new(bigquery), Arc::new(DocumentSearchTool::new(search, 10)));
        Agent::new(
            "spend_analyst",
            model,
            "google/gemini-3-pro-preview",
            "Answer vendor spend questions.".to_string(),
            tools,
        )
    }

    fn fakes() -> (Arc<FakeWarehouse>, Arc<FakeSearch>) {
        let warehouse = Arc::new(FakeWarehouse::new("SELECT", vec![vendor_row()], Some(1)));
        let search = Arc::new(FakeSearch::new(vec![SearchHit {
            id: "msa-globex".to_string(),
            title: Some("Globex MSA".to_string()),
            link: None,
            excerpts: vec!["Spend above $150,000 requires a competitive bid.".to_string()],
        }]));
        (warehouse, search)
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "execute_sql".to_string(),
            arguments: r#"{"query": "SELECT 1"}"#.to_string(),
            result: "{}".to_string(),
        };
        assert_eq!(format!("{}", record), r#"execute_sql({"query": "SELECT 1"})"#);
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text("Hello.")]));
        let response = agent(model.clone(), warehouse, search).run("Hi").await.unwrap();

        assert_eq!(response.content, "Hello.");
        assert_eq!(response.iterations, 1);
        assert!(response.tool_calls.is_empty());

        let request = &model.requests()[0];
        assert_eq!(request.model, "google/gemini-3-pro-preview");
        assert_eq!(request.tools.as_ref().map(Vec::len), Some(7));
        assert!(matches!(request.messages[0], Message::System(_)));
    }

    #[tokio::test]
    async fn test_hybrid_investigation() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_calls(&[(
                "call_1",
                "execute_sql",
                r#"{"query": "SELECT vendor, SUM(amount) AS amount FROM t GROUP BY vendor"}"#,
            )]),
            ScriptedModel::tool_calls(&[("call_2", "search_documents", r#"{"query": "Globex contract"}"#)]),
            ScriptedModel::text("Globex spent $182,000 without a competitive bid (Source: Globex MSA)."),
        ]));

        let response = agent(model.clone(), warehouse.clone(), search.clone())
            .run("Which vendors exceeded the bid threshold?")
            .await
            .unwrap();

        assert_eq!(response.iterations, 3);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].name, "execute_sql");
        assert!(response.tool_calls[0].result.contains("Globex"));
        assert!(response.tool_calls[1].result.contains("competitive bid"));
        assert_eq!(warehouse.executed().len(), 1);
        assert_eq!(search.queries(), vec!["Globex contract".to_string()]);

        // system, user, assistant(tool), tool, assistant(tool), tool
        assert_eq!(model.requests()[2].messages.len(), 6);
    }

    #[tokio::test]
    async fn test_parallel_tool_calls_keep_order() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_calls(&[
                ("a", "list_dataset_ids", "{}"),
                ("b", "search_documents", r#"{"query": "audit"}"#),
            ]),
            ScriptedModel::text("done"),
        ]));

        let response = agent(model.clone(), warehouse, search).run("Overview").await.unwrap();
        let names: Vec<&str> = response.tool_calls.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["list_dataset_ids", "search_documents"]);

        let messages = &model.requests()[1].messages;
        match (&messages[3], &messages[4]) {
            (Message::Tool(first), Message::Tool(second)) => {
                assert_eq!(first.tool_call_id, "a");
                assert_eq!(second.tool_call_id, "b");
            }
            other => panic!("Expected tool messages, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_statement_reaches_model_as_error() {
        let warehouse = Arc::new(FakeWarehouse::new("DELETE", vec![], None));
        let (_, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_calls(&[("call_1", "execute_sql", r#"{"query": "DELETE FROM t WHERE TRUE"}"#)]),
            ScriptedModel::text("I can only run read-only queries."),
        ]));

        let response = agent(model, warehouse.clone(), search).run("Delete it").await.unwrap();
        assert!(response.tool_calls[0]
            .result
            .contains("Read-only mode only supports SELECT statements."));
        assert!(warehouse.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_calls(&[("call_1", "drop_table", "{}")]),
            ScriptedModel::text("ok"),
        ]));

        let response = agent(model, warehouse, search).run("x").await.unwrap();
        assert!(response.tool_calls[0].result.starts_with("Failed to parse tool call"));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::tool_calls(&[("1", "list_dataset_ids", "{}")]),
            ScriptedModel::tool_calls(&[("2", "list_dataset_ids", "{}")]),
            ScriptedModel::tool_calls(&[("3", "list_dataset_ids", "{}")]),
        ]));

        let err = agent(model, warehouse, search)
            .with_max_iterations(2)
            .run("loop")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maximum iterations (2)"));
    }

    #[tokio::test]
    async fn test_session_keeps_history() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::text("Globex is the top vendor."),
            ScriptedModel::text("Their contract is net 60."),
        ]));
        let agent = Arc::new(agent(model.clone(), warehouse, search));
        let mut session = ChatSession::new(agent).unwrap();

        session.send("Top vendor?").await.unwrap();
        assert_eq!(session.len(), 2);
        session.send("Their payment terms?").await.unwrap();
        assert_eq!(session.len(), 4);
        // system + 3 prior messages + the new question
        assert_eq!(model.requests()[1].messages.len(), 4);

        session.clear();
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_rolls_back() {
        let (warehouse, search) = fakes();
        let model = Arc::new(ScriptedModel::new(vec![]));
        let mut session = ChatSession::new(Arc::new(agent(model, warehouse, search))).unwrap();

        assert!(session.send("Anyone there?").await.is_err());
        assert!(session.is_empty());
    }
}
