//! Structured-query tool collection backed by BigQuery.
//!
//! The toolset exposes schema exploration, read-only SQL execution and
//! natural-language questions over the configured table. Every result is
//! rendered as a JSON document for the model.

mod client;
mod insights;
mod rows;
mod toolset;

pub use client::BigQueryClient;
pub use insights::{extract_sql, DataInsights};
pub use rows::{decode_rows, FieldSchema, TableSchema};
pub use toolset::{check_statement, BigQueryToolset};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Whether the toolset may run statements other than `SELECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Only `SELECT` statements run; everything else is refused.
    Blocked,
    /// Any statement runs.
    Allowed,
}

/// Toolset configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BigQueryToolConfig {
    pub write_mode: WriteMode,
    /// Maximum rows returned per query.
    pub max_query_result_rows: usize,
}

impl BigQueryToolConfig {
    /// Read-only configuration.
    pub fn read_only(max_query_result_rows: usize) -> Self {
        Self {
            write_mode: WriteMode::Blocked,
            max_query_result_rows,
        }
    }
}

impl Default for BigQueryToolConfig {
    fn default() -> Self {
        Self::read_only(50)
    }
}

/// Fully qualified table reference, in BigQuery's REST casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(project_id: &str, dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Result of a dry run.
#[derive(Debug, Clone, Default)]
pub struct DryRun {
    /// Statement type reported by BigQuery (`SELECT`, `INSERT`, ...).
    pub statement_type: Option<String>,
    pub total_bytes_processed: Option<u64>,
}

/// Rows returned by a query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<Map<String, Value>>,
    /// Total rows in the full result, when reported.
    pub total_rows: Option<u64>,
}

/// Operations the toolset needs from the warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn list_datasets(&self, project_id: &str) -> Result<Vec<String>>;

    async fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<Value>;

    async fn list_tables(&self, project_id: &str, dataset_id: &str) -> Result<Vec<String>>;

    async fn get_table(&self, table: &TableRef) -> Result<Value>;

    /// Validate a query without running it.
    async fn dry_run(&self, project_id: &str, sql: &str) -> Result<DryRun>;

    /// Run a query, returning at most `max_rows` rows.
    async fn query(&self, project_id: &str, sql: &str, max_rows: usize) -> Result<QueryOutput>;
}
