//! REST implementation of the remote authority

use async_trait::async_trait;
use careerlink_core::{
    AuthResponse, CareerlinkError, CareerlinkResult, ErrorContext, LoginRequest, RegisterRequest,
    VerifyResponse,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::client::{create_http_client, handle_response_error, ApiClientConfig};
use crate::RemoteAuthority;

/// Authority client speaking the platform's `/auth/*` endpoints
pub struct HttpAuthority {
    client: reqwest::Client,
    config: ApiClientConfig,
}

impl HttpAuthority {
    /// Create a new authority client
    pub fn new(config: ApiClientConfig) -> CareerlinkResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created authority client for {}", config.base_url);

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiClientConfig {
        &self.config
    }

    /// Send a request, map transport failures and non-2xx statuses, decode the body
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> CareerlinkResult<T> {
        let response = request.send().await.map_err(|e| CareerlinkError::Network {
            message: format!("Failed to reach the authority: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_authority")
                .with_operation(operation)
                .with_suggestion("Check api.base_url and network connectivity"),
        })?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, operation).await);
        }

        response.json::<T>().await.map_err(|e| CareerlinkError::Network {
            message: format!("Failed to parse authority response: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_authority").with_operation(operation),
        })
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthority {
    async fn login(&self, email: &str, password: &str) -> CareerlinkResult<AuthResponse> {
        let url = self.config.endpoint("auth/login");
        debug!("Sending login request to: {}", url);

        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        self.execute(self.client.post(&url).json(&body), "login")
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> CareerlinkResult<AuthResponse> {
        let url = self.config.endpoint("auth/register");
        debug!("Sending register request to: {}", url);

        self.execute(self.client.post(&url).json(request), "register")
            .await
    }

    async fn verify_token(&self, token: &str) -> CareerlinkResult<VerifyResponse> {
        let url = self.config.endpoint("auth/verify");
        debug!("Verifying token against: {}", url);

        self.execute(self.client.get(&url).bearer_auth(token), "verify_token")
            .await
    }
}
