//! OpenStack Client
//!
//! Main client for interacting with OpenStack service APIs, combining
//! Keystone authentication, catalog lookup and HTTP functionality.

use super::auth::OsCredentials;
use super::http::{is_unauthorized, OsHttpClient};
use crate::config::AuthSettings;
use anyhow::Result;
use serde_json::Value;
use std::future::Future;

/// Main OpenStack client
#[derive(Clone)]
pub struct OsClient {
    pub credentials: OsCredentials,
    pub http: OsHttpClient,
}

impl OsClient {
    /// Create a new OpenStack client; authentication happens on first use
    pub fn new(settings: AuthSettings) -> Result<Self> {
        let http = OsHttpClient::new()?;
        let credentials = OsCredentials::new(settings, http.clone());
        Ok(Self { credentials, http })
    }

    /// Get the current Keystone token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Build a URL under the catalog endpoint of a service
    /// e.g. `("volumev3", "volumes/detail")` -> `https://cinder/v3/<project>/volumes/detail`
    pub async fn service_url(&self, service_type: &str, path: &str) -> Result<String> {
        let endpoint = self.credentials.endpoint(service_type).await?;
        Ok(join_url(&endpoint, path))
    }

    /// Make a GET request to an OpenStack API
    pub async fn get(&self, url: &str) -> Result<Value> {
        self.with_token(|token| async move { self.http.get(url, &token).await })
            .await
    }

    /// Make a POST request to an OpenStack API
    pub async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        self.with_token(|token| async move { self.http.post(url, &token, body).await })
            .await
    }

    /// Make a PUT request to an OpenStack API
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        self.with_token(|token| async move { self.http.put(url, &token, body).await })
            .await
    }

    /// Make a DELETE request to an OpenStack API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.with_token(|token| async move { self.http.delete(url, &token).await })
            .await
    }

    /// Run `call` with the cached token; on 401 re-authenticate and retry once
    async fn with_token<F, Fut>(&self, call: F) -> Result<Value>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let token = self.get_token().await?;
        match call(token).await {
            Err(e) if is_unauthorized(&e) => {
                tracing::debug!("Token rejected, authenticating again");
                let token = self.credentials.refresh_token().await?;
                call(token).await
            }
            result => result,
        }
    }
}

/// Join an endpoint and a relative path with exactly one slash between them
pub fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Format an OpenStack API error for display
pub fn format_api_error(error: &anyhow::Error) -> String {
    super::http::format_api_error(error)
}
