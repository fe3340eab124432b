//! File-based settings for spendscope.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub bigquery: BigQuerySettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Model invocation settings.
///
/// The model id itself comes from the `MODEL_NAME` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Vertex AI location serving the model.
    pub location: String,
    /// Sampling temperature. Kept low for factual analysis.
    pub temperature: f32,
    /// Maximum model calls per user turn.
    pub max_iterations: usize,
    /// HTTP timeout for a single model call.
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            location: "global".to_string(),
            temperature: 0.1,
            max_iterations: 15,
            timeout_secs: 300,
        }
    }
}

/// BigQuery tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQuerySettings {
    /// Maximum rows returned to the model per query.
    pub max_query_result_rows: usize,
    /// Server-side wait per `jobs.query` / `getQueryResults` call.
    pub query_timeout_ms: u64,
}

impl Default for BigQuerySettings {
    fn default() -> Self {
        Self {
            max_query_result_rows: 50,
            query_timeout_ms: 30_000,
        }
    }
}

/// Document search tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Default number of results per search.
    pub page_size: u32,
    /// Request an extractive answer per result (enterprise datastores).
    pub extractive_answers: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_size: 10,
            extractive_answers: true,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Sessions unused for this long are dropped.
    pub session_idle_secs: u64,
    /// Upper bound on live sessions; the least recently used goes first.
    pub max_sessions: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            session_idle_secs: 1800,
            max_sessions: 1000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SpendscopeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spendscope")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.model.location, "global");
        assert!((settings.model.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(settings.bigquery.max_query_result_rows, 50);
        assert_eq!(settings.search.page_size, 10);
        assert_eq!(settings.server.max_sessions, 1000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.model.max_iterations, 15);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\nmax_iterations = 4\n\n[search]\npage_size = 3\n").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.model.max_iterations, 4);
        assert_eq!(settings.model.location, "global");
        assert_eq!(settings.search.page_size, 3);
        assert!(settings.search.extractive_answers);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.bigquery.max_query_result_rows = 7;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.bigquery.max_query_result_rows, 7);
    }
}
