//! Google Cloud plumbing: ambient credentials, access tokens and an
//! authorized REST client shared by the BigQuery, search and model clients.

mod client;
mod credentials;
mod metadata;
mod token;

pub use client::{google_error_message, http_client, http_client_with_timeout, GoogleClient};
pub use credentials::{
    AuthorizedUserKey, CredentialFile, CredentialSource, Credentials, ServiceAccountKey,
    GCLOUD_PROJECT, GOOGLE_APPLICATION_CREDENTIALS, GOOGLE_CLOUD_PROJECT,
};
pub use metadata::MetadataServer;
pub use token::{
    MetadataTokens, ServiceAccountTokens, StaticToken, TokenProvider, TokenResponse, UserTokens,
    CLOUD_PLATFORM_SCOPE,
};
