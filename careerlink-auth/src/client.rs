//! HTTP plumbing shared by authority clients

use careerlink_core::{ApiConfig, CareerlinkError, CareerlinkResult, ErrorContext};
use serde::Deserialize;
use std::collections::HashMap;

/// Configuration for API clients
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for the API, e.g. `https://careers.example.com/api`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

impl From<&ApiConfig> for ApiClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
            headers: HashMap::new(),
        }
    }
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Join an endpoint onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn client_error(message: String, source: Box<dyn std::error::Error + Send + Sync>) -> CareerlinkError {
    CareerlinkError::Config {
        message,
        source: Some(source),
        context: ErrorContext::new("http_client").with_operation("create_client"),
    }
}

/// Helper function to create HTTP client with common configuration
pub(crate) fn create_http_client(config: &ApiClientConfig) -> CareerlinkResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| client_error(format!("Invalid user agent: {}", e), Box::new(e)))?,
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    for (key, value) in &config.headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            client_error(format!("Invalid header name '{}': {}", key, e), Box::new(e))
        })?;

        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            client_error(
                format!("Invalid header value for '{}': {}", key, e),
                Box::new(e),
            )
        })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| client_error(format!("Failed to create HTTP client: {}", e), Box::new(e)))
}

/// Error body shapes the authority is known to return
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Pull a human-readable message out of an error body
pub(crate) fn extract_server_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
}

/// Helper function to turn a non-2xx response into an error
pub(crate) async fn handle_response_error(
    response: reqwest::Response,
    operation: &str,
) -> CareerlinkError {
    let status = response.status();
    let url = response.url().clone();

    let error_body = response.text().await.unwrap_or_default();
    let server_message = extract_server_message(&error_body);

    CareerlinkError::Authentication {
        message: format!(
            "HTTP {} error for {}: {}",
            status.as_u16(),
            url,
            server_message
                .as_deref()
                .or(status.canonical_reason())
                .unwrap_or("Unknown error")
        ),
        server_message,
        status: Some(status.as_u16()),
        context: ErrorContext::new("api_client")
            .with_operation(operation)
            .with_suggestion(match status.as_u16() {
                400 | 422 => "Check the submitted fields",
                401 => "Check your credentials or sign in again",
                403 => "This account is not allowed to perform the operation",
                409 => "An account with this email may already exist",
                _ => "Check network connectivity and API status",
            }),
    }
}
