//! BigQuery REST v2 client.

use super::rows::{decode_rows, TableSchema};
use super::{DryRun, QueryOutput, TableRef, Warehouse};
use crate::error::{Result, SpendscopeError};
use crate::gcp::{GoogleClient, TokenProvider};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

const BIGQUERY_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Upper bound on `getQueryResults` polls for a single query.
const MAX_POLLS: usize = 20;

/// BigQuery client running jobs in a fixed location.
pub struct BigQueryClient {
    api: GoogleClient,
    location: String,
    timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetEntry {
    dataset_reference: DatasetReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    dataset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableEntry {
    table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<Value>,
    total_rows: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

impl BigQueryClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        location: &str,
        timeout_ms: u64,
    ) -> Self {
        Self {
            api: GoogleClient::new(http, tokens, "BigQuery"),
            location: location.to_string(),
            timeout_ms,
        }
    }

    fn endpoint(segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(BIGQUERY_BASE)?;
        url.path_segments_mut()
            .map_err(|_| SpendscopeError::BigQuery("invalid API base URL".to_string()))?
            .extend(segments);
        Ok(url)
    }

    async fn poll_results(
        &self,
        project_id: &str,
        job: &JobReference,
        max_rows: usize,
    ) -> Result<QueryResponse> {
        let location = job.location.as_deref().unwrap_or(&self.location);

        for attempt in 1..=MAX_POLLS {
            let mut url = Self::endpoint(&["projects", project_id, "queries", job.job_id.as_str()])?;
            url.query_pairs_mut()
                .append_pair("location", location)
                .append_pair("maxResults", &max_rows.to_string())
                .append_pair("timeoutMs", &self.timeout_ms.to_string());

            let response: QueryResponse = self.api.get(url).await?;
            if response.job_complete {
                return Ok(response);
            }
            debug!("Query job {} still running (poll {})", job.job_id, attempt);
        }

        Err(SpendscopeError::BigQuery(format!(
            "query job {} did not complete after {} polls",
            job.job_id, MAX_POLLS
        )))
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    #[instrument(skip(self))]
    async fn list_datasets(&self, project_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Self::endpoint(&["projects", project_id, "datasets"])?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let page: DatasetList = self.api.get(url).await?;
            ids.extend(page.datasets.into_iter().map(|d| d.dataset_reference.dataset_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<Value> {
        let url = Self::endpoint(&["projects", project_id, "datasets", dataset_id])?;
        self.api.get(url).await
    }

    #[instrument(skip(self))]
    async fn list_tables(&self, project_id: &str, dataset_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Self::endpoint(&["projects", project_id, "datasets", dataset_id, "tables"])?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let page: TableList = self.api.get(url).await?;
            ids.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    #[instrument(skip(self, table), fields(table = %table))]
    async fn get_table(&self, table: &TableRef) -> Result<Value> {
        let url = Self::endpoint(&[
            "projects",
            table.project_id.as_str(),
            "datasets",
            table.dataset_id.as_str(),
            "tables",
            table.table_id.as_str(),
        ])?;
        self.api.get(url).await
    }

    #[instrument(skip(self, sql))]
    async fn dry_run(&self, project_id: &str, sql: &str) -> Result<DryRun> {
        let url = Self::endpoint(&["projects", project_id, "jobs"])?;
        let body = json!({
            "jobReference": { "projectId": project_id, "location": self.location },
            "configuration": {
                "dryRun": true,
                "query": { "query": sql, "useLegacySql": false }
            }
        });

        let job: Value = self.api.post(url, &body).await?;
        let statement_type = job
            .pointer("/statistics/query/statementType")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let total_bytes_processed: Option<u64> = job
            .pointer("/statistics/totalBytesProcessed")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());

        debug!("Dry run: {:?} ({:?} bytes)", statement_type, total_bytes_processed);
        Ok(DryRun {
            statement_type,
            total_bytes_processed,
        })
    }

    #[instrument(skip(self, sql))]
    async fn query(&self, project_id: &str, sql: &str, max_rows: usize) -> Result<QueryOutput> {
        let url = Self::endpoint(&["projects", project_id, "queries"])?;
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.location,
            "maxResults": max_rows,
            "timeoutMs": self.timeout_ms,
        });

        let mut response: QueryResponse = self.api.post(url, &body).await?;
        if !response.job_complete {
            let job = response.job_reference.take().ok_or_else(|| {
                SpendscopeError::BigQuery("incomplete query without a job reference".to_string())
            })?;
            response = self.poll_results(project_id, &job, max_rows).await?;
        }

        if let Some(error) = response.errors.first() {
            return Err(SpendscopeError::BigQuery(error.message.clone()));
        }

        let schema = response.schema.unwrap_or_default();
        let mut rows = decode_rows(&schema, &response.rows);
        rows.truncate(max_rows);

        Ok(QueryOutput {
            rows,
            total_rows: response.total_rows.and_then(|s| s.parse().ok()),
        })
    }
}
