//! Client for the remote authentication authority
//!
//! The authority issues and verifies the opaque tokens that back a session.
//! [`RemoteAuthority`] is the contract the session manager depends on;
//! [`HttpAuthority`] implements it over the platform's REST API.

use async_trait::async_trait;
use careerlink_core::{AuthResponse, CareerlinkResult, RegisterRequest, VerifyResponse};

pub mod client;
pub mod http;

pub use client::ApiClientConfig;
pub use http::HttpAuthority;

/// Remote service that authenticates credentials and issues/verifies tokens
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Exchange email and password for a token and user record
    async fn login(&self, email: &str, password: &str) -> CareerlinkResult<AuthResponse>;

    /// Create an account and sign it in
    async fn register(&self, request: &RegisterRequest) -> CareerlinkResult<AuthResponse>;

    /// Ask the authority whether a previously issued token is still valid
    async fn verify_token(&self, token: &str) -> CareerlinkResult<VerifyResponse>;
}
