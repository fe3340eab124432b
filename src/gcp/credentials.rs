//! Application Default Credentials discovery.
//!
//! Lookup order:
//! 1. the file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! 2. the gcloud well-known file (`application_default_credentials.json`)
//! 3. the compute metadata server
//!
//! The project id is taken from `GOOGLE_CLOUD_PROJECT` / `GCLOUD_PROJECT` when
//! set, otherwise from the credentials themselves, the active gcloud
//! configuration, or the metadata server.

use super::metadata::MetadataServer;
use super::token::{MetadataTokens, ServiceAccountTokens, TokenProvider, UserTokens};
use crate::config::{EnvVars, Settings};
use crate::error::{Result, SpendscopeError};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
pub const GCLOUD_PROJECT: &str = "GCLOUD_PROJECT";

const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

/// Service account key file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// End-user credentials written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// A parsed credentials file.
#[derive(Debug, Clone)]
pub enum CredentialFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

impl CredentialFile {
    /// Parse a credentials JSON document.
    pub fn parse(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| SpendscopeError::Credentials(format!("invalid credentials JSON: {}", e)))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SpendscopeError::Credentials("credentials file has no 'type'".to_string()))?
            .to_string();

        let invalid = |e: serde_json::Error| {
            SpendscopeError::Credentials(format!("invalid {} credentials: {}", kind, e))
        };

        match kind.as_str() {
            "service_account" => Ok(Self::ServiceAccount(
                serde_json::from_value(value.clone()).map_err(invalid)?,
            )),
            "authorized_user" => Ok(Self::AuthorizedUser(
                serde_json::from_value(value.clone()).map_err(invalid)?,
            )),
            other => Err(SpendscopeError::Credentials(format!(
                "unsupported credentials type: {}",
                other
            ))),
        }
    }

    /// Read and parse a credentials file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpendscopeError::Credentials(format!(
                "credentials file {} was not found",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Project id carried by the file itself, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::ServiceAccount(key) => key.project_id.as_deref(),
            Self::AuthorizedUser(key) => key.quota_project_id.as_deref(),
        }
    }

    fn into_provider(self, http: reqwest::Client) -> Result<Arc<dyn TokenProvider>> {
        let provider: Arc<dyn TokenProvider> = match self {
            Self::ServiceAccount(key) => Arc::new(ServiceAccountTokens::new(http, key)?),
            Self::AuthorizedUser(key) => Arc::new(UserTokens::new(http, key)),
        };
        Ok(provider)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service account",
            Self::AuthorizedUser(_) => "authorized user",
        }
    }
}

/// Where the credentials were found.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// File named by `GOOGLE_APPLICATION_CREDENTIALS`.
    EnvironmentFile(PathBuf),
    /// gcloud well-known file.
    GcloudFile(PathBuf),
    /// Compute metadata server.
    MetadataServer,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvironmentFile(p) => write!(f, "{} ({})", GOOGLE_APPLICATION_CREDENTIALS, p.display()),
            Self::GcloudFile(p) => write!(f, "gcloud ADC file ({})", p.display()),
            Self::MetadataServer => write!(f, "metadata server"),
        }
    }
}

/// Resolved ambient credentials and the project they belong to.
pub struct Credentials {
    pub project_id: String,
    pub source: CredentialSource,
    pub kind: &'static str,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("project_id", &self.project_id)
            .field("source", &self.source)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Discover Application Default Credentials.
    pub async fn discover(env: &EnvVars, http: reqwest::Client) -> Result<Self> {
        if let Some(path) = env.get(GOOGLE_APPLICATION_CREDENTIALS) {
            let path = Settings::expand_path(path);
            let file = CredentialFile::load(&path)?;
            return Self::from_file(file, CredentialSource::EnvironmentFile(path), env, http);
        }

        if let Some(path) = well_known_file(env) {
            if path.exists() {
                let file = CredentialFile::load(&path)?;
                return Self::from_file(file, CredentialSource::GcloudFile(path), env, http);
            }
        }

        if !env.flag("NO_GCE_CHECK") {
            let server = MetadataServer::new(http.clone(), env.get("GCE_METADATA_HOST"));
            if server.is_available().await {
                let project_id = match explicit_project(env) {
                    Some(p) => p.to_string(),
                    None => server.project_id().await?,
                };
                info!("Using metadata server credentials for project {}", project_id);
                return Ok(Self {
                    project_id,
                    source: CredentialSource::MetadataServer,
                    kind: "compute service account",
                    tokens: Arc::new(MetadataTokens::new(server)),
                });
            }
        }

        Err(SpendscopeError::Credentials(
            "could not find default credentials. Set GOOGLE_APPLICATION_CREDENTIALS \
             or run `gcloud auth application-default login`"
                .to_string(),
        ))
    }

    fn from_file(
        file: CredentialFile,
        source: CredentialSource,
        env: &EnvVars,
        http: reqwest::Client,
    ) -> Result<Self> {
        let project_id = explicit_project(env)
            .map(str::to_string)
            .or_else(|| file.project_id().map(str::to_string))
            .or_else(|| gcloud_project(env))
            .ok_or_else(|| {
                SpendscopeError::Credentials(format!(
                    "could not determine the project id; set {}",
                    GOOGLE_CLOUD_PROJECT
                ))
            })?;

        debug!("Loaded {} credentials from {}", file.kind(), source);
        let kind = file.kind();
        Ok(Self {
            project_id,
            source,
            kind,
            tokens: file.into_provider(http)?,
        })
    }

    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        Arc::clone(&self.tokens)
    }
}

fn explicit_project(env: &EnvVars) -> Option<&str> {
    env.get(GOOGLE_CLOUD_PROJECT).or_else(|| env.get(GCLOUD_PROJECT))
}

/// gcloud configuration directory.
fn gcloud_config_dir(env: &EnvVars) -> Option<PathBuf> {
    if let Some(dir) = env.get("CLOUDSDK_CONFIG") {
        return Some(Settings::expand_path(dir));
    }
    if cfg!(windows) {
        env.get("APPDATA").map(|d| PathBuf::from(d).join("gcloud"))
    } else {
        dirs::home_dir().map(|h| h.join(".config").join("gcloud"))
    }
}

fn well_known_file(env: &EnvVars) -> Option<PathBuf> {
    gcloud_config_dir(env).map(|d| d.join(WELL_KNOWN_FILE))
}

/// Project of the active gcloud configuration.
fn gcloud_project(env: &EnvVars) -> Option<String> {
    let dir = gcloud_config_dir(env)?;
    let active = std::fs::read_to_string(dir.join("active_config"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "default".to_string());
    let content =
        std::fs::read_to_string(dir.join("configurations").join(format!("config_{}", active))).ok()?;
    ini_value(&content, "core", "project")
}

/// Look up `key` in `[section]` of an INI document.
fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
    let section_re = Regex::new(r"^\s*\[([^\]]+)\]\s*$").ok()?;
    let entry_re = Regex::new(r"^\s*([A-Za-z0-9_\-]+)\s*=\s*(.*?)\s*$").ok()?;

    let mut current = String::new();
    for line in content.lines() {
        if let Some(caps) = section_re.captures(line) {
            current = caps[1].trim().to_string();
            continue;
        }
        if current != section {
            continue;
        }
        if let Some(caps) = entry_re.captures(line) {
            if &caps[1] == key && !caps[2].is_empty() {
                return Some(caps[2].to_string());
            }
        }
    }
    None
}
