//! HTTP utilities for OpenStack REST API calls

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

/// Header carrying the Keystone token on every service request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Non-success HTTP status returned by an OpenStack API
#[derive(Debug, thiserror::Error)]
#[error("API request failed: {status}")]
pub struct ApiError {
    pub status: StatusCode,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Check whether an error chain was caused by a 404 from the API
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_not_found)
}

/// Check whether an error chain was caused by a rejected token (401)
pub fn is_unauthorized(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(|e| e.status == StatusCode::UNAUTHORIZED)
}

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Raw response: headers plus parsed JSON body (`Null` when empty)
#[derive(Debug)]
pub struct RawResponse {
    pub headers: HeaderMap,
    pub body: Value,
}

/// HTTP client wrapper for OpenStack API calls
#[derive(Clone)]
pub struct OsHttpClient {
    client: Client,
}

impl OsHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("osops/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to an OpenStack API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).header(AUTH_TOKEN_HEADER, token);
        Ok(self.send(request).await?.body)
    }

    /// Make a POST request to an OpenStack API
    pub async fn post(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .header(AUTH_TOKEN_HEADER, token)
            .json(body);
        Ok(self.send(request).await?.body)
    }

    /// Make a PUT request to an OpenStack API
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PUT {}", url);
        let request = self
            .client
            .put(url)
            .header(AUTH_TOKEN_HEADER, token)
            .json(body);
        Ok(self.send(request).await?.body)
    }

    /// Make a DELETE request to an OpenStack API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        let request = self.client.delete(url).header(AUTH_TOKEN_HEADER, token);
        Ok(self.send(request).await?.body)
    }

    /// POST without a token, keeping response headers (Keystone issues the
    /// token in `X-Subject-Token`)
    pub async fn post_unauthenticated(&self, url: &str, body: &Value) -> Result<RawResponse> {
        tracing::debug!("POST {}", url);
        self.send(self.client.post(url).json(body)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<RawResponse> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized/truncated body is logged
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(ApiError { status }.into());
        }

        // Handle empty response (204 on delete/update)
        if text.is_empty() {
            return Ok(RawResponse {
                headers,
                body: Value::Null,
            });
        }

        let body = serde_json::from_str(&text).context("Failed to parse response JSON")?;
        Ok(RawResponse { headers, body })
    }
}

/// Format an OpenStack API error for display
/// Maps common status codes to short messages and never echoes raw API bodies
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(api) = error.downcast_ref::<ApiError>() {
        let message = match api.status.as_u16() {
            400 => "Invalid request. Check your parameters.",
            401 => "Authentication failed. Check your OS_* credentials.",
            403 => "Permission denied. Check your project role assignments.",
            404 => "Resource not found.",
            409 => "Resource conflict. The resource may already exist or be in use.",
            413 | 429 => "Rate limit or quota exceeded. Please try again later.",
            500 | 502 | 503 => "OpenStack service temporarily unavailable. Please try again.",
            _ => "Request failed. Check your network connection and try again.",
        };
        return message.to_string();
    }

    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
