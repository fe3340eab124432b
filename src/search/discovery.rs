//! Discovery Engine (Vertex AI Search) REST client.

use super::{DataStorePath, DocumentSearch, SearchHit};
use crate::error::Result;
use crate::gcp::{GoogleClient, TokenProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

/// Searches a datastore through its default serving config.
pub struct DiscoveryEngineSearch {
    api: GoogleClient,
    datastore: DataStorePath,
    extractive_answers: bool,
}

impl DiscoveryEngineSearch {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        datastore: DataStorePath,
        extractive_answers: bool,
    ) -> Self {
        Self {
            api: GoogleClient::new(http, tokens, "Discovery Engine"),
            datastore,
            extractive_answers,
        }
    }

    /// `global` datastores use the global host; others use the regional one.
    pub fn endpoint(&self) -> Result<Url> {
        let host = match self.datastore.location.as_str() {
            "global" => "discoveryengine.googleapis.com".to_string(),
            region => format!("{}-discoveryengine.googleapis.com", region),
        };
        Ok(Url::parse(&format!(
            "https://{}/v1/{}/servingConfigs/default_search:search",
            host, self.datastore
        ))?)
    }

    fn request_body(&self, query: &str, page_size: u32) -> Value {
        let mut content_spec = json!({
            "snippetSpec": { "returnSnippet": true }
        });
        if self.extractive_answers {
            content_spec["extractiveContentSpec"] = json!({ "maxExtractiveAnswerCount": 1 });
        }
        json!({
            "query": query,
            "pageSize": page_size,
            "contentSearchSpec": content_spec,
        })
    }
}

#[async_trait]
impl DocumentSearch for DiscoveryEngineSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, page_size: u32) -> Result<Vec<SearchHit>> {
        let response: Value = self
            .api
            .post(self.endpoint()?, &self.request_body(query, page_size))
            .await?;
        let hits = parse_results(&response);
        debug!("Search returned {} results", hits.len());
        Ok(hits)
    }
}

/// Convert a `:search` response into hits, keeping rank order.
pub(crate) fn parse_results(response: &Value) -> Vec<SearchHit> {
    let results = response
        .get("results")
        .and_then(|r| r.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    results
        .iter()
        .filter_map(|result| result.get("document"))
        .map(|document| {
            let derived = document.get("derivedStructData");
            let text = |key: &str| {
                derived
                    .and_then(|d| d.get(key))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };

            let mut excerpts = collect_strings(derived, "extractive_answers", "content");
            excerpts.extend(collect_strings(derived, "snippets", "snippet"));
            excerpts.retain(|e| !e.trim().is_empty() && !e.contains("No snippet is available"));

            SearchHit {
                id: document
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                title: text("title"),
                link: text("link"),
                excerpts,
            }
        })
        .collect()
}

fn collect_strings(derived: Option<&Value>, list: &str, field: &str) -> Vec<String> {
    derived
        .and_then(|d| d.get(list))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(|v| v.as_str()))
                .map(strip_markup)
                .collect()
        })
        .unwrap_or_default()
}

/// Snippets highlight matches with `<b>` tags and escape entities.
fn strip_markup(text: &str) -> String {
    text.replace("<b>", "")
        .replace("</b>", "")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
