//! Keystone Authentication
//!
//! Project-scoped password authentication against the Keystone v3 API.
//! The issued token and the service catalog are cached together and
//! refreshed shortly before the token expires.

use super::http::OsHttpClient;
use crate::config::AuthSettings;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Header in which Keystone returns the issued token
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Refresh tokens this long before they actually expire so a request never
/// goes out with a token that lapses in flight
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

/// Fallback TTL when Keystone omits `expires_at`
const DEFAULT_TOKEN_TTL_SECS: i64 = 30 * 60;

/// One service in the Keystone catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One endpoint of a catalog service
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    pub url: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
}

impl CatalogEndpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region.as_deref() == Some(region) || self.region_id.as_deref() == Some(region)
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: TokenInfo,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Clone)]
struct CachedSession {
    token: String,
    /// When this token expires (with buffer applied)
    refresh_at: DateTime<Utc>,
    catalog: Vec<CatalogEntry>,
}

impl CachedSession {
    fn is_valid(&self) -> bool {
        Utc::now() < self.refresh_at
    }
}

/// Keystone credentials holder with token caching
#[derive(Clone)]
pub struct OsCredentials {
    settings: Arc<AuthSettings>,
    http: OsHttpClient,
    session: Arc<RwLock<Option<CachedSession>>>,
}

impl OsCredentials {
    /// Create credentials; no request is made until a token is needed
    pub fn new(settings: AuthSettings, http: OsHttpClient) -> Self {
        Self {
            settings: Arc::new(settings),
            http,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a token for API calls, authenticating if the cached one is stale
    pub async fn get_token(&self) -> Result<String> {
        Ok(self.session().await?.token)
    }

    /// Resolve the endpoint URL for a service type from the catalog
    pub async fn endpoint(&self, service_type: &str) -> Result<String> {
        let session = self.session().await?;
        let interface = self.settings.interface.as_str();
        let region = self.settings.region.as_deref();

        let service = session
            .catalog
            .iter()
            .find(|entry| entry.service_type == service_type)
            .with_context(|| format!("Service '{}' not found in catalog", service_type))?;

        service
            .endpoints
            .iter()
            .filter(|ep| ep.interface == interface)
            .find(|ep| region.map_or(true, |r| ep.in_region(r)))
            .map(|ep| ep.url.trim_end_matches('/').to_string())
            .with_context(|| {
                format!(
                    "No {} endpoint for service '{}' in region {:?}",
                    interface, service_type, region
                )
            })
    }

    /// Drop the cached token and authenticate again
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.session.write().await;
            *cache = None;
        }
        self.get_token().await
    }

    async fn session(&self) -> Result<CachedSession> {
        {
            let cache = self.session.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.clone());
                }
                tracing::debug!("Cached token expired, authenticating again");
            }
        }

        let session = self.authenticate().await?;
        {
            let mut cache = self.session.write().await;
            *cache = Some(session.clone());
        }

        tracing::debug!("New token cached, refresh at {}", session.refresh_at);
        Ok(session)
    }

    async fn authenticate(&self) -> Result<CachedSession> {
        let url = format!("{}/auth/tokens", self.settings.auth_url.trim_end_matches('/'));
        let response = self
            .http
            .post_unauthenticated(&url, &password_request(&self.settings))
            .await
            .context("Keystone authentication failed")?;

        let token = response
            .headers
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .context("Keystone response is missing the X-Subject-Token header")?
            .to_string();

        let body: TokenBody = serde_json::from_value(response.body)
            .context("Failed to parse Keystone token response")?;

        let expires_at = body
            .token
            .expires_at
            .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(DEFAULT_TOKEN_TTL_SECS));

        tracing::info!(
            "Authenticated as {} (project {}), token expires at {}",
            self.settings.username,
            self.settings.project_name,
            expires_at
        );

        Ok(CachedSession {
            token,
            refresh_at: expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_BUFFER_SECS),
            catalog: body.token.catalog,
        })
    }
}

/// Build the Keystone v3 password + project scope request body
fn password_request(settings: &AuthSettings) -> Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": settings.username,
                        "domain": { "name": settings.user_domain_name },
                        "password": settings.password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": settings.project_name,
                    "domain": { "name": settings.project_domain_name },
                }
            }
        }
    })
}
