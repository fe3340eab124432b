//! Document-search tool over a Vertex AI Search datastore.

mod discovery;

pub use discovery::DiscoveryEngineSearch;

use crate::error::{Result, SpendscopeError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

/// Maximum characters of each excerpt handed to the model.
const MAX_EXCERPT_CHARS: usize = 800;

/// A datastore resource path, either
/// `projects/{p}/locations/{l}/collections/{c}/dataStores/{d}` or the short
/// `projects/{p}/locations/{l}/dataStores/{d}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStorePath {
    pub project: String,
    pub location: String,
    /// `None` for the short form, which the service resolves to the default collection.
    pub collection: Option<String>,
    pub data_store: String,
}

impl FromStr for DataStorePath {
    type Err = SpendscopeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SpendscopeError::Config(format!("invalid datastore resource path: {}", s));

        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        let (project, location, collection, data_store) = match parts.as_slice() {
            ["projects", project, "locations", location, "collections", collection, "dataStores", data_store] => {
                (*project, *location, Some(*collection), *data_store)
            }
            ["projects", project, "locations", location, "dataStores", data_store] => {
                (*project, *location, None, *data_store)
            }
            _ => return Err(invalid()),
        };

        if [project, location, data_store].iter().any(|p| p.is_empty())
            || collection.is_some_and(str::is_empty)
        {
            return Err(invalid());
        }

        Ok(Self {
            project: project.to_string(),
            location: location.to_string(),
            collection: collection.map(str::to_string),
            data_store: data_store.to_string(),
        })
    }
}

impl fmt::Display for DataStorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/locations/{}", self.project, self.location)?;
        if let Some(collection) = &self.collection {
            write!(f, "/collections/{}", collection)?;
        }
        write!(f, "/dataStores/{}", self.data_store)
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub excerpts: Vec<String>,
}

/// Keyword/semantic search over an indexed corpus.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search(&self, query: &str, page_size: u32) -> Result<Vec<SearchHit>>;
}

/// The `search_documents` tool.
pub struct DocumentSearchTool {
    backend: Arc<dyn DocumentSearch>,
    page_size: u32,
}

impl DocumentSearchTool {
    pub fn new(backend: Arc<dyn DocumentSearch>, page_size: u32) -> Self {
        Self { backend, page_size }
    }

    /// Search and format ranked excerpts for the model.
    #[instrument(skip(self))]
    pub async fn search_documents(&self, query: &str, page_size: Option<u32>) -> Result<String> {
        if query.trim().is_empty() {
            return Err(SpendscopeError::Search("query must not be empty".to_string()));
        }
        let page_size = page_size.unwrap_or(self.page_size).clamp(1, 100);
        let hits = self.backend.search(query, page_size).await?;
        Ok(format_hits(&hits))
    }
}

/// Render hits as a numbered list of excerpts.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No relevant documents found.".to_string();
    }

    let formatted = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let title = hit.title.as_deref().unwrap_or(&hit.id);
            let mut entry = format!("{}. {}", i + 1, title);
            if let Some(link) = &hit.link {
                entry.push_str(&format!(" ({})", link));
            }
            for excerpt in &hit.excerpts {
                let excerpt: String = excerpt.chars().take(MAX_EXCERPT_CHARS).collect();
                entry.push_str(&format!("\n   {}", excerpt.replace('\n', " ")));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("Found {} documents:\n\n{}", hits.len(), formatted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeSearch;

    fn hit(id: &str, title: &str, excerpt: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            title: Some(title.to_string()),
            link: Some(format!("gs://contracts/{}.pdf", id)),
            excerpts: vec![excerpt.to_string()],
        }
    }

    #[test]
    fn test_parse_datastore_path() {
        let path: DataStorePath =
            "projects/acme-prod/locations/eu/collections/default_collection/dataStores/vendor-docs"
                .parse()
                .unwrap();
        assert_eq!(path.project, "acme-prod");
        assert_eq!(path.location, "eu");
        assert_eq!(path.collection.as_deref(), Some("default_collection"));
        assert_eq!(path.data_store, "vendor-docs");
        assert_eq!(
            path.to_string(),
            "projects/acme-prod/locations/eu/collections/default_collection/dataStores/vendor-docs"
        );
    }

    #[test]
    fn test_parse_short_datastore_path() {
        let path: DataStorePath = "projects/acme-prod/locations/global/dataStores/vendor-docs"
            .parse()
            .unwrap();
        assert_eq!(path.collection, None);
        assert_eq!(path.data_store, "vendor-docs");
        assert_eq!(path.to_string(), "projects/acme-prod/locations/global/dataStores/vendor-docs");
    }

    #[test]
    fn test_parse_invalid_datastore_path() {
        assert!("projects/acme-prod/dataStores/vendor-docs".parse::<DataStorePath>().is_err());
        assert!("projects//locations/eu/collections/c/dataStores/d".parse::<DataStorePath>().is_err());
        assert!("projects/p/locations/eu/collections//dataStores/d".parse::<DataStorePath>().is_err());
        assert!("projects/p/locations/eu/dataStores/".parse::<DataStorePath>().is_err());
    }

    #[test]
    fn test_format_no_hits() {
        assert_eq!(format_hits(&[]), "No relevant documents found.");
    }

    #[test]
    fn test_format_hits() {
        let text = format_hits(&[
            hit("msa-globex", "Globex MSA", "Payment terms are net 60.\nLate fees apply."),
            SearchHit {
                id: "audit-2025".to_string(),
                ..Default::default()
            },
        ]);
        assert!(text.starts_with("Found 2 documents:"));
        assert!(text.contains("1. Globex MSA (gs://contracts/msa-globex.pdf)"));
        assert!(text.contains("   Payment terms are net 60. Late fees apply."));
        assert!(text.contains("2. audit-2025"));
    }

    #[tokio::test]
    async fn test_tool_uses_default_page_size() {
        let backend = Arc::new(FakeSearch::new(vec![
            hit("a", "A", "first"),
            hit("b", "B", "second"),
            hit("c", "C", "third"),
        ]));
        let tool = DocumentSearchTool::new(backend.clone(), 2);

        let text = tool.search_documents("Globex payment terms", None).await.unwrap();
        assert!(text.starts_with("Found 2 documents:"));
        assert_eq!(backend.queries(), vec!["Globex payment terms".to_string()]);

        let text = tool.search_documents("Globex", Some(3)).await.unwrap();
        assert!(text.starts_with("Found 3 documents:"));
    }

    #[tokio::test]
    async fn test_tool_rejects_blank_query() {
        let backend = Arc::new(FakeSearch::new(vec![]));
        let tool = DocumentSearchTool::new(backend.clone(), 10);
        assert!(tool.search_documents("  ", None).await.is_err());
        assert!(backend.queries().is_empty());
    }
}
