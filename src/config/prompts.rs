//! Prompt templates for spendscope.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use super::Deployment;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Prompts for natural-language questions against the table.
    pub insights: InsightsPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Instruction given to the analysis agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub instruction: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            instruction: r#"You are a Hybrid Analysis Agent for vendor spend compliance. You answer complex questions by correlating
structured records in BigQuery with unstructured documents in Vertex AI Search.

Today's date is: {{date}}

<DATA_SOURCES>
You can reach TWO complementary data sources:

1. **Structured Database (BigQuery)**:
   - Project: {{project_id}}
   - Dataset: {{dataset_id}}
   - Table: {{table_id}}

   Holds structured spend records. Query it to find specific vendors, amounts,
   metrics or trends.

2. **Unstructured Documents (Vertex AI Search)**:
   Holds contracts, policies, audit reports and other text that carries the
   qualitative context and ground truth the database does not.
</DATA_SOURCES>

<TOOLS>
**BigQuery Tools** (structured data):
- `get_table_info`: schema and metadata of a table.
- `execute_sql`: run a read-only GoogleSQL query to filter, aggregate or fetch records.
  - Example: "SELECT * FROM `{{project_id}}.{{dataset_id}}.{{table_id}}` WHERE <condition> LIMIT 10"
- `ask_data_insights`: ask a natural-language question about the table's data.
- `list_dataset_ids`, `get_dataset_info`, `list_table_ids`: explore what else exists.

**Document Search Tools** (unstructured data):
- `search_documents`: search the document repository.
  - Use targeted queries built from the entities your BigQuery analysis surfaced.
  - Returns: ranked excerpts from matching documents.
</TOOLS>

<WORKFLOW>
For an analysis request, work in three steps:

1. **Explore Structured Data**:
   - Call `get_table_info` when you need the schema.
   - Use `execute_sql` or `ask_data_insights` to pull relevant records, find the
     key vendors or metrics, and filter on the user's criteria.

2. **Deep Dive with Unstructured Search**:
   - For each entity or topic found in step 1, call `search_documents`.
   - Write specific queries that look for detail, context, or evidence that
     confirms or contradicts the numbers.

3. **Synthesize Findings**:
   - Combine the quantitative facts from BigQuery with the qualitative findings
     from the documents.
   - Keep what the database says separate from what the documents say.
   - Answer the user's actual question completely.
</WORKFLOW>

<NOTES>
- The database tells you "what" and "how much"; the documents tell you "why" and the details.
- Use the documents to verify or extend what the database shows.
- Adapt queries and searches to the domain of the request.
- Never attempt to modify data; the database is read-only.
</NOTES>"#
                .to_string(),
        }
    }
}

/// Prompts for translating a question into a single SQL query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsPrompts {
    pub system: String,
    pub user: String,
}

impl Default for InsightsPrompts {
    fn default() -> Self {
        Self {
            system: r#"You translate analytical questions into BigQuery GoogleSQL.

Rules:
- Produce exactly one SELECT statement (WITH clauses are allowed)
- Only reference the tables listed in the schema section, fully qualified with backticks
- Never produce INSERT, UPDATE, DELETE, MERGE, CREATE, DROP or any other statement
- Prefer aggregates and explicit LIMIT clauses over returning raw rows
- Respond with the SQL only, no explanation"#
                .to_string(),

            user: r#"Question: {{question}}

Available tables:
{{schemas}}

Write the query."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }

            let insights_path = custom_path.join("insights.toml");
            if insights_path.exists() {
                let content = std::fs::read_to_string(&insights_path)?;
                prompts.insights = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Build the agent instruction for a deployment on the given day.
    ///
    /// Fails when the dataset or table id is missing.
    pub fn build_instruction(
        &self,
        deployment: &Deployment,
        today: NaiveDate,
    ) -> crate::error::Result<String> {
        let mut vars = HashMap::new();
        vars.insert("date".to_string(), today.format("%Y-%m-%d").to_string());
        vars.insert("project_id".to_string(), deployment.project_id.clone());
        vars.insert("dataset_id".to_string(), deployment.dataset_id()?.to_string());
        vars.insert("table_id".to_string(), deployment.table_id()?.to_string());

        Ok(self.render_with_custom(&self.agent.instruction, &vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvVars;

    fn deployment() -> Deployment {
        let env = EnvVars::from_pairs([("BQ_DATASET_ID", "procurement"), ("BQ_TABLE_ID", "vendor_spend")]);
        Deployment::resolve(&env, "acme-prod")
    }

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.agent.instruction.is_empty());
        assert!(!prompts.insights.system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_instruction_substitutions() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let instruction = Prompts::default().build_instruction(&deployment(), today).unwrap();

        assert!(instruction.contains("Today's date is: 2026-03-09"));
        assert!(instruction.contains("- Project: acme-prod"));
        assert!(instruction.contains("- Dataset: procurement"));
        assert!(instruction.contains("- Table: vendor_spend"));
        assert!(instruction.contains("`acme-prod.procurement.vendor_spend`"));
        assert!(!instruction.contains("{{"));
    }

    #[test]
    fn test_instruction_requires_table() {
        let env = EnvVars::from_pairs([("BQ_DATASET_ID", "procurement")]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        let today = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert!(Prompts::default().build_instruction(&deployment, today).is_err());
    }

    #[test]
    fn test_provided_variables_override_custom() {
        let mut custom = HashMap::new();
        custom.insert("project_id".to_string(), "from-config".to_string());
        custom.insert("team".to_string(), "Procurement Ops".to_string());
        let mut prompts = Prompts::default();
        prompts.variables = custom;
        prompts.agent.instruction = "{{project_id}} / {{team}}".to_string();

        let today = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let instruction = prompts.build_instruction(&deployment(), today).unwrap();
        assert_eq!(instruction, "acme-prod / Procurement Ops");
    }

    #[test]
    fn test_load_custom_agent_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("agent.toml"),
            "instruction = \"Analyze {{table_id}} only.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.agent.instruction, "Analyze {{table_id}} only.");
        assert!(!prompts.insights.system.is_empty());
    }
}
