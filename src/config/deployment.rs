//! Deployment values resolved from the process environment.
//!
//! Resolution is a pure function of an [`EnvVars`] snapshot and the detected
//! project id. Nothing here writes back into the process environment.

use crate::error::{Result, SpendscopeError};
use serde::Serialize;
use std::collections::HashMap;

/// Model used when `MODEL_NAME` is not set.
pub const DEFAULT_MODEL_NAME: &str = "gemini-3-pro-preview";

/// BigQuery job location used when `BQ_LOCATION` is not set.
pub const DEFAULT_BQ_LOCATION: &str = "us-central1";

/// Datastore region used when `DATA_STORE_REGION` is not set.
pub const DEFAULT_DATA_STORE_REGION: &str = "global";

pub const MODEL_NAME: &str = "MODEL_NAME";
pub const BQ_DATASET_ID: &str = "BQ_DATASET_ID";
pub const BQ_TABLE_ID: &str = "BQ_TABLE_ID";
pub const BQ_LOCATION: &str = "BQ_LOCATION";
pub const DATA_STORE_ID: &str = "DATA_STORE_ID";
pub const DATA_STORE_REGION: &str = "DATA_STORE_REGION";
pub const VERTEX_AI_SEARCH_DATASTORE: &str = "VERTEX_AI_SEARCH_DATASTORE";

/// Immutable snapshot of environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up a trimmed variable. Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether a variable is set to `true`/`1` (case-insensitive).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }
}

/// The resolved deployment bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub project_id: String,
    pub model_name: String,
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,
    pub bq_location: String,
    pub data_store_id: Option<String>,
    pub data_store_region: String,
    /// Full datastore resource path, explicit or synthesized.
    pub datastore_path: Option<String>,
}

impl Deployment {
    /// Resolve the bundle from an environment snapshot and a project id.
    pub fn resolve(env: &EnvVars, project_id: &str) -> Self {
        let data_store_id = env.get(DATA_STORE_ID).map(str::to_string);
        let data_store_region = env
            .get(DATA_STORE_REGION)
            .unwrap_or(DEFAULT_DATA_STORE_REGION)
            .to_string();

        let datastore_path = match env.get(VERTEX_AI_SEARCH_DATASTORE) {
            Some(explicit) => Some(explicit.to_string()),
            None => data_store_id
                .as_deref()
                .map(|id| datastore_resource_path(project_id, &data_store_region, id)),
        };

        Self {
            project_id: project_id.to_string(),
            model_name: env.get(MODEL_NAME).unwrap_or(DEFAULT_MODEL_NAME).to_string(),
            dataset_id: env.get(BQ_DATASET_ID).map(str::to_string),
            table_id: env.get(BQ_TABLE_ID).map(str::to_string),
            bq_location: env.get(BQ_LOCATION).unwrap_or(DEFAULT_BQ_LOCATION).to_string(),
            data_store_id,
            data_store_region,
            datastore_path,
        }
    }

    pub fn dataset_id(&self) -> Result<&str> {
        required(self.dataset_id.as_deref(), BQ_DATASET_ID)
    }

    pub fn table_id(&self) -> Result<&str> {
        required(self.table_id.as_deref(), BQ_TABLE_ID)
    }

    pub fn datastore_path(&self) -> Result<&str> {
        self.datastore_path.as_deref().ok_or_else(|| {
            SpendscopeError::Config(format!(
                "neither {} nor {} is set",
                VERTEX_AI_SEARCH_DATASTORE, DATA_STORE_ID
            ))
        })
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value.ok_or_else(|| SpendscopeError::Config(format!("{} is not set", name)))
}

/// Build a datastore resource path in the default collection.
pub fn datastore_resource_path(project_id: &str, region: &str, data_store_id: &str) -> String {
    format!(
        "projects/{}/locations/{}/collections/default_collection/dataStores/{}",
        project_id, region, data_store_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let deployment = Deployment::resolve(&EnvVars::default(), "acme-prod");
        assert_eq!(deployment.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(deployment.bq_location, "us-central1");
        assert_eq!(deployment.data_store_region, "global");
        assert!(deployment.dataset_id.is_none());
        assert!(deployment.datastore_path.is_none());
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let env = EnvVars::from_pairs([(MODEL_NAME, ""), (BQ_LOCATION, "  ")]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(deployment.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(deployment.bq_location, DEFAULT_BQ_LOCATION);
    }

    #[test]
    fn test_synthesized_datastore_path() {
        let env = EnvVars::from_pairs([(DATA_STORE_ID, "vendor-docs"), (DATA_STORE_REGION, "eu")]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(
            deployment.datastore_path().unwrap(),
            "projects/acme-prod/locations/eu/collections/default_collection/dataStores/vendor-docs"
        );
    }

    #[test]
    fn test_values_are_trimmed() {
        let env = EnvVars::from_pairs([(DATA_STORE_ID, " vendor-docs\n"), (DATA_STORE_REGION, " eu ")]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(deployment.data_store_region, "eu");
        assert_eq!(
            deployment.datastore_path().unwrap(),
            "projects/acme-prod/locations/eu/collections/default_collection/dataStores/vendor-docs"
        );
    }

    #[test]
    fn test_synthesized_path_uses_default_region() {
        let env = EnvVars::from_pairs([(DATA_STORE_ID, "vendor-docs")]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(
            deployment.datastore_path().unwrap(),
            "projects/acme-prod/locations/global/collections/default_collection/dataStores/vendor-docs"
        );
    }

    #[test]
    fn test_explicit_datastore_path_wins_verbatim() {
        let explicit = "projects/other/locations/us/collections/custom/dataStores/contracts";
        let env = EnvVars::from_pairs([
            (VERTEX_AI_SEARCH_DATASTORE, explicit),
            (DATA_STORE_ID, "ignored"),
            (DATA_STORE_REGION, "eu"),
        ]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(deployment.datastore_path().unwrap(), explicit);
    }

    #[test]
    fn test_explicit_values() {
        let env = EnvVars::from_pairs([
            (MODEL_NAME, "gemini-2.5-flash"),
            (BQ_DATASET_ID, "procurement"),
            (BQ_TABLE_ID, "vendor_spend"),
            (BQ_LOCATION, "US"),
        ]);
        let deployment = Deployment::resolve(&env, "acme-prod");
        assert_eq!(deployment.model_name, "gemini-2.5-flash");
        assert_eq!(deployment.dataset_id().unwrap(), "procurement");
        assert_eq!(deployment.table_id().unwrap(), "vendor_spend");
        assert_eq!(deployment.bq_location, "US");
    }

    #[test]
    fn test_missing_required_values_error_on_use() {
        let deployment = Deployment::resolve(&EnvVars::default(), "acme-prod");
        let err = deployment.table_id().unwrap_err();
        assert!(err.to_string().contains("BQ_TABLE_ID"));
        assert!(deployment.datastore_path().is_err());
    }

    #[test]
    fn test_flag() {
        let env = EnvVars::from_pairs([("A", "TRUE"), ("B", "1"), ("C", "no")]);
        assert!(env.flag("A"));
        assert!(env.flag("B"));
        assert!(!env.flag("C"));
        assert!(!env.flag("D"));
    }
}
