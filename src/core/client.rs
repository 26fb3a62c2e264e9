//! Annotation API Client
//!
//! Issues exactly one request per annotation job. No retry, no backoff and
//! no timeout beyond what the transport does natively.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::normalizer;
use super::SourceText;
use crate::config::{Settings, SettingsStore, TransportMode};
use crate::error::ApiError;

pub const REQUEST_FAILED_MESSAGE: &str = "API request failed.";
pub const MISSING_ENDPOINT_MESSAGE: &str = "API endpoint is not configured.";
pub const MISSING_KEY_MESSAGE: &str = "API key is required when not using a proxy.";
pub const INVALID_JSON_MESSAGE: &str = "API response was not valid JSON.";

/// An outbound POST
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body text of a response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and hands back the raw response
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Errors are network-level failures only; any HTTP status is a response.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        // The request carries its own Content-Type, so the body goes in raw
        let mut builder = self
            .client
            .post(&request.url)
            .body(serde_json::to_vec(&request.body)?);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Client for the remote annotation service
#[derive(Clone)]
pub struct ApiClient {
    settings: Arc<dyn SettingsStore>,
    transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    pub fn new(settings: Arc<dyn SettingsStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Annotate `text`, returning the service's HTML
    pub async fn annotate(&self, text: &SourceText) -> Result<String, ApiError> {
        let settings = Settings::load(self.settings.as_ref());
        let request = build_request(text, &settings)?;

        debug!("📤 POST {} ({} chars)", request.url, text.as_str().chars().count());

        let response = self
            .transport
            .post(request)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.is_success() {
            warn!("❌ Annotation API error ({}): {}", response.status, response.body);
            let message = if response.body.trim().is_empty() {
                REQUEST_FAILED_MESSAGE.to_string()
            } else {
                response.body
            };
            return Err(ApiError::Service(message));
        }

        let raw: Value = serde_json::from_str(&response.body).map_err(|e| {
            warn!("❌ Failed to parse annotation response: {} - Body: {}", e, response.body);
            ApiError::EmptyResponse(INVALID_JSON_MESSAGE.to_string())
        })?;

        normalizer::normalize(&raw).into_result()
    }
}

/// Validate settings and assemble the request for one job
pub fn build_request(text: &SourceText, settings: &Settings) -> Result<HttpRequest, ApiError> {
    let url = settings.api_endpoint.trim();
    if url.is_empty() {
        return Err(ApiError::Configuration(MISSING_ENDPOINT_MESSAGE.to_string()));
    }

    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if settings.transport_mode() == TransportMode::Direct {
        let key = settings.api_key.trim();
        if key.is_empty() {
            return Err(ApiError::Configuration(MISSING_KEY_MESSAGE.to_string()));
        }
        headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
    }

    Ok(HttpRequest {
        url: url.to_string(),
        headers,
        body: settings.request_format.build_body(text, settings),
    })
}
