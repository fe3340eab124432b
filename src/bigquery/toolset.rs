//! The BigQuery toolset exposed to the agent.

use super::insights::{describe_schema, DataInsights};
use super::{BigQueryToolConfig, TableRef, Warehouse, WriteMode};
use crate::error::{Result, SpendscopeError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Refuse statements the write mode does not permit.
pub fn check_statement(mode: WriteMode, statement_type: Option<&str>) -> Result<()> {
    match mode {
        WriteMode::Allowed => Ok(()),
        WriteMode::Blocked => match statement_type {
            Some(t) if t.eq_ignore_ascii_case("SELECT") => Ok(()),
            _ => Err(SpendscopeError::BigQuery(
                "Read-only mode only supports SELECT statements.".to_string(),
            )),
        },
    }
}

/// Schema exploration, SQL execution and data Q&A over a warehouse.
pub struct BigQueryToolset {
    warehouse: Arc<dyn Warehouse>,
    config: BigQueryToolConfig,
    project_id: String,
    default_table: Option<TableRef>,
    insights: Option<DataInsights>,
}

impl BigQueryToolset {
    pub fn new(warehouse: Arc<dyn Warehouse>, config: BigQueryToolConfig, project_id: &str) -> Self {
        Self {
            warehouse,
            config,
            project_id: project_id.to_string(),
            default_table: None,
            insights: None,
        }
    }

    /// Table used by `ask_data_insights` when none is named.
    pub fn with_default_table(mut self, table: TableRef) -> Self {
        self.default_table = Some(table);
        self
    }

    pub fn with_insights(mut self, insights: DataInsights) -> Self {
        self.insights = Some(insights);
        self
    }

    pub fn config(&self) -> &BigQueryToolConfig {
        &self.config
    }

    fn project<'a>(&'a self, project_id: Option<&'a str>) -> &'a str {
        project_id.unwrap_or(&self.project_id)
    }

    #[instrument(skip(self))]
    pub async fn list_dataset_ids(&self, project_id: Option<&str>) -> String {
        match self.warehouse.list_datasets(self.project(project_id)).await {
            Ok(ids) => success_result(json!(ids)),
            Err(e) => error_result(&e),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_dataset_info(&self, project_id: Option<&str>, dataset_id: &str) -> String {
        match self.warehouse.get_dataset(self.project(project_id), dataset_id).await {
            Ok(info) => success_result(info),
            Err(e) => error_result(&e),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_table_ids(&self, project_id: Option<&str>, dataset_id: &str) -> String {
        match self.warehouse.list_tables(self.project(project_id), dataset_id).await {
            Ok(ids) => success_result(json!(ids)),
            Err(e) => error_result(&e),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_table_info(
        &self,
        project_id: Option<&str>,
        dataset_id: &str,
        table_id: &str,
    ) -> String {
        let table = TableRef::new(self.project(project_id), dataset_id, table_id);
        match self.warehouse.get_table(&table).await {
            Ok(info) => success_result(info),
            Err(e) => error_result(&e),
        }
    }

    #[instrument(skip(self, query))]
    pub async fn execute_sql(&self, project_id: Option<&str>, query: &str) -> String {
        match self.run_query(self.project(project_id), query).await {
            Ok(result) => result.to_string(),
            Err(e) => error_result(&e),
        }
    }

    /// Run a query through the write-mode gate.
    pub async fn run_query(&self, project_id: &str, sql: &str) -> Result<Value> {
        if self.config.write_mode == WriteMode::Blocked {
            let dry_run = self.warehouse.dry_run(project_id, sql).await?;
            if let Err(e) = check_statement(self.config.write_mode, dry_run.statement_type.as_deref()) {
                warn!("Refused {:?} statement in read-only mode", dry_run.statement_type);
                return Err(e);
            }
        }

        let max_rows = self.config.max_query_result_rows;
        let output = self.warehouse.query(project_id, sql, max_rows).await?;
        let truncated = match output.total_rows {
            Some(total) => total > output.rows.len() as u64,
            None => output.rows.len() >= max_rows,
        };
        info!("Query returned {} rows", output.rows.len());

        let mut result = json!({ "status": "SUCCESS", "rows": output.rows });
        if truncated {
            result["result_is_likely_truncated"] = json!(true);
        }
        Ok(result)
    }

    /// Answer a natural-language question about one or more tables.
    #[instrument(skip(self, tables))]
    pub async fn ask_data_insights(
        &self,
        project_id: Option<&str>,
        question: &str,
        tables: &[TableRef],
    ) -> String {
        let Some(insights) = &self.insights else {
            return error_result(&SpendscopeError::BigQuery(
                "data insights are not configured".to_string(),
            ));
        };

        let tables: Vec<TableRef> = if tables.is_empty() {
            self.default_table.iter().cloned().collect()
        } else {
            tables.to_vec()
        };
        if tables.is_empty() {
            return error_result(&SpendscopeError::InvalidInput(
                "no table references given".to_string(),
            ));
        }

        let mut schemas = Vec::with_capacity(tables.len());
        for table in &tables {
            match self.warehouse.get_table(table).await {
                Ok(metadata) => schemas.push(describe_schema(table, &metadata)),
                Err(e) => return error_result(&e),
            }
        }

        let sql = match insights.generate_sql(question, &schemas.join("\n\n")).await {
            Ok(sql) => sql,
            Err(e) => return error_result(&e),
        };

        match self.run_query(self.project(project_id), &sql).await {
            Ok(mut result) => {
                result["question"] = json!(question);
                result["sql"] = json!(sql);
                result.to_string()
            }
            Err(e) => json!({
                "status": "ERROR",
                "error_details": e.to_string(),
                "sql": sql,
            })
            .to_string(),
        }
    }
}

fn success_result(results: Value) -> String {
    json!({ "status": "SUCCESS", "results": results }).to_string()
}

fn error_result(error: &SpendscopeError) -> String {
    json!({ "status": "ERROR", "error_details": error.to_string() }).to_string()
}
