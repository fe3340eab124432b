//! Natural-language questions over BigQuery tables.
//!
//! The model turns the question into one GoogleSQL statement, which then runs
//! through the toolset's normal (read-only) query path.

use super::rows::{FieldSchema, TableSchema};
use super::TableRef;
use crate::config::Prompts;
use crate::error::{Result, SpendscopeError};
use crate::llm::ChatModel;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// SQL generator backed by the chat model.
pub struct DataInsights {
    model: Arc<dyn ChatModel>,
    model_id: String,
    prompts: Prompts,
}

impl DataInsights {
    pub fn new(model: Arc<dyn ChatModel>, model_id: &str, prompts: Prompts) -> Self {
        Self {
            model,
            model_id: model_id.to_string(),
            prompts,
        }
    }

    /// Ask the model for a single query answering `question`.
    #[instrument(skip(self, schemas))]
    pub async fn generate_sql(&self, question: &str, schemas: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("schemas".to_string(), schemas.to_string());
        let user_prompt = self.prompts.render_with_custom(&self.prompts.insights.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.insights.system.clone())
                .build()
                .map_err(|e| SpendscopeError::Llm(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| SpendscopeError::Llm(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_id)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| SpendscopeError::Llm(e.to_string()))?;

        let response = self.model.chat(request).await?;
        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| SpendscopeError::Llm("Empty response from model".to_string()))?;

        let sql = extract_sql(text)?;
        debug!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

/// Pull the SQL statement out of a model reply, dropping code fences and a
/// trailing semicolon.
pub fn extract_sql(text: &str) -> Result<String> {
    let fenced = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```")
        .map_err(|e| SpendscopeError::Agent(e.to_string()))?;

    let body = match fenced.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => text,
    };

    let sql = body.trim().trim_end_matches(';').trim();
    if sql.is_empty() {
        return Err(SpendscopeError::Llm("Model returned no SQL".to_string()));
    }
    Ok(sql.to_string())
}

/// Describe a table's columns for the SQL prompt.
pub(crate) fn describe_schema(table: &TableRef, metadata: &Value) -> String {
    let schema: TableSchema = metadata
        .get("schema")
        .cloned()
        .and_then(|s| serde_json::from_value(s).ok())
        .unwrap_or_default();

    let mut lines = vec![format!("Table `{}`", table)];
    if let Some(description) = metadata.get("description").and_then(|d| d.as_str()) {
        lines.push(format!("  Description: {}", description));
    }
    push_fields(&mut lines, &schema.fields, "");
    lines.join("\n")
}

fn push_fields(lines: &mut Vec<String>, fields: &[FieldSchema], prefix: &str) {
    for field in fields {
        let name = format!("{}{}", prefix, field.name);
        let mut line = format!("  - {} {}", name, field.field_type);
        if let Some(mode) = field.mode.as_deref().filter(|m| *m != "NULLABLE") {
            line.push_str(&format!(" ({})", mode));
        }
        if let Some(description) = field.description.as_deref() {
            line.push_str(&format!(": {}", description));
        }
        lines.push(line);
        push_fields(lines, &field.fields, &format!("{}.", name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;
    use serde_json::json;

    #[test]
    fn test_extract_sql_from_fence() {
        let reply = "Here you go:\n```sql\nSELECT vendor, SUM(amount) FROM `p.d.t` GROUP BY vendor;\n```";
        assert_eq!(
            extract_sql(reply).unwrap(),
            "SELECT vendor, SUM(amount) FROM `p.d.t` GROUP BY vendor"
        );
    }

    #[test]
    fn test_extract_plain_sql() {
        assert_eq!(extract_sql("  SELECT 1;  ").unwrap(), "SELECT 1");
    }

    #[test]
    fn test_extract_empty_reply() {
        assert!(extract_sql("```sql\n```").is_err());
    }

    #[test]
    fn test_describe_schema_nested() {
        let table = TableRef::new("acme-prod", "procurement", "vendor_spend");
        let metadata = json!({
            "description": "Invoice-level spend",
            "schema": {"fields": [
                {"name": "vendor", "type": "STRING", "mode": "NULLABLE", "description": "Legal name"},
                {"name": "lines", "type": "RECORD", "mode": "REPEATED", "fields": [
                    {"name": "amount", "type": "NUMERIC"}
                ]}
            ]}
        });

        let text = describe_schema(&table, &metadata);
        assert!(text.starts_with("Table `acme-prod.procurement.vendor_spend`"));
        assert!(text.contains("  Description: Invoice-level spend"));
        assert!(text.contains("  - vendor STRING: Legal name"));
        assert!(text.contains("  - lines RECORD (REPEATED)"));
        assert!(text.contains("  - lines.amount NUMERIC"));
    }

    #[tokio::test]
    async fn test_generate_sql_renders_question_and_schema() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::text(
            "```sql\nSELECT COUNT(*) FROM `acme-prod.procurement.vendor_spend`\n```",
        )]));
        let insights = DataInsights::new(model.clone(), "google/gemini-3-pro-preview", Prompts::default());

        let sql = insights
            .generate_sql("How many invoices?", "Table `acme-prod.procurement.vendor_spend`")
            .await
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM `acme-prod.procurement.vendor_spend`");

        let requests = model.requests();
        let sent = serde_json::to_string(&requests[0]).unwrap();
        assert!(sent.contains("How many invoices?"));
        assert!(sent.contains("acme-prod.procurement.vendor_spend"));
    }
}
