//! API client for communicating with the DevJourney REST API.
//!
//! `ApiClient` is the raw transport: it sends one request and maps the
//! response, nothing more. Token attachment policy and the refresh-and-retry
//! protocol live in [`crate::gateway::SessionGateway`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{CredentialBundle, LoginRequest, RefreshResponse, RegisterRequest};

use super::{ApiError, ApiRequest, ApiResponse};

// ============================================================================
// Constants
// ============================================================================

pub const AUTH_LOGIN_PATH: &str = "/auth/login";
pub const AUTH_REGISTER_PATH: &str = "/auth/register";
pub const AUTH_REFRESH_PATH: &str = "/auth/refresh-token";
pub const AUTH_LOGOUT_PATH: &str = "/auth/logout";
pub const USERS_CURRENT_PATH: &str = "/users/current";

/// API client for DevJourney.
/// Clone is cheap - reqwest::Client and the cookie jar are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    cookies: Arc<Jar>,
}

impl ApiClient {
    /// Create a new API client for the given base URL (e.g. `https://host/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(timeout)
            .cookie_provider(Arc::clone(&cookies))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookies,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a request once, with the given bearer token if any.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url(request.path());
        debug!(
            method = %request.method(),
            url = %url,
            authenticated = bearer.is_some(),
            "Sending API request"
        );

        let headers = Self::request_headers(request, bearer)?;
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(headers);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let response = Self::check_response(response).await?;

        Ok(ApiResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.bytes().await?.to_vec(),
        })
    }

    /// The caller's headers, with any `Authorization` replaced by the bearer token.
    ///
    /// Without a token the caller's headers are sent untouched.
    fn request_headers(
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<header::HeaderMap, ApiError> {
        let mut headers = request.headers().clone();
        if let Some(token) = bearer {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid access token: {}", e)))?;
            // insert() drops every existing value for the name
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, "API request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    /// POST to an auth endpoint without a bearer token
    async fn post_unauthenticated<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        Self::check_response(response).await
    }

    // ===== Auth Endpoints =====

    /// Authenticate with email and password
    pub async fn login(&self, request: &LoginRequest) -> Result<CredentialBundle, ApiError> {
        let response = self.post_unauthenticated(AUTH_LOGIN_PATH, request).await?;
        Self::parse_auth(response).await
    }

    /// Create an account; the API signs the new user in immediately
    pub async fn register(&self, request: &RegisterRequest) -> Result<CredentialBundle, ApiError> {
        let response = self.post_unauthenticated(AUTH_REGISTER_PATH, request).await?;
        Self::parse_auth(response).await
    }

    async fn parse_auth(response: reqwest::Response) -> Result<CredentialBundle, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse auth response: {}", e)))
    }

    /// Mint a new access token from the refresh-token cookie.
    ///
    /// Authenticated only by the cookie jar; never sends a bearer header.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(AUTH_REFRESH_PATH))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let refreshed: RefreshResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;
        Ok(refreshed.access_token)
    }

    // ===== Cookie Persistence =====

    fn refresh_url(&self) -> Option<Url> {
        Url::parse(&self.url(AUTH_REFRESH_PATH)).ok()
    }

    /// Cookies the jar would send to the refresh endpoint, as a `Cookie` header value
    pub fn export_cookies(&self) -> Option<String> {
        let url = self.refresh_url()?;
        let value = self.cookies.cookies(&url)?;
        value.to_str().ok().map(str::to_string)
    }

    /// Load cookies previously returned by [`export_cookies`](Self::export_cookies)
    pub fn restore_cookies(&self, cookie_header: &str) {
        let Some(url) = self.refresh_url() else {
            warn!(base_url = %self.base_url, "Cannot restore cookies for invalid URL");
            return;
        };
        for pair in cookie_header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.cookies.add_cookie_str(pair, &url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:5000/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/blogs"), "http://localhost:5000/api/blogs");
        assert_eq!(client.url("blogs/1"), "http://localhost:5000/api/blogs/1");
    }

    #[test]
    fn test_bearer_replaces_caller_authorization() {
        let request = ApiRequest::get("/users/current").header(
            header::AUTHORIZATION,
            header::HeaderValue::from_static("Bearer old"),
        );

        let headers = ApiClient::request_headers(&request, Some("new")).unwrap();
        let values: Vec<_> = headers.get_all(header::AUTHORIZATION).iter().collect();
        assert_eq!(values, vec!["Bearer new"]);

        // No stored token: the caller's header is left alone
        let headers = ApiClient::request_headers(&request, None).unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer old");
    }

    #[test]
    fn test_unprintable_token_is_rejected() {
        let request = ApiRequest::get("/blogs");
        assert!(matches!(
            ApiClient::request_headers(&request, Some("bad\ntoken")),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_cookie_round_trip_through_jar() {
        let client = ApiClient::new("http://localhost:5000/api", Duration::from_secs(5)).unwrap();
        assert_eq!(client.export_cookies(), None);

        client.restore_cookies("refreshToken=abc123");
        assert_eq!(client.export_cookies().as_deref(), Some("refreshToken=abc123"));
    }
}
