//! Session gateway: the single path every API call takes.
//!
//! The gateway attaches the stored access token, and when the API answers
//! 401 it refreshes the token once and replays the request once. If the
//! refresh itself fails the local session is cleared and the navigator is
//! sent to the login entry point.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::client::{AUTH_LOGOUT_PATH, USERS_CURRENT_PATH};
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResponse};
use crate::auth::{RefreshCoordinator, Session};
use crate::models::{
    CredentialBundle, CurrentUserResponse, LoginRequest, ProfileUpdate, RegisterRequest, UserSummary,
};

/// Login entry point the navigator is sent to when the session ends
pub const LOGIN_PATH: &str = "/login";

/// Where the gateway sends the user when re-authentication is required.
pub trait Navigator: Send + Sync {
    fn redirect(&self, location: &str);
}

/// Navigator for headless use; records the redirect in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, location: &str) {
        info!(location, "Redirect requested");
    }
}

/// How a logout ended. The local session is cleared either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The server acknowledged the logout, possibly after one refresh
    Confirmed,
    /// The server could not confirm; carries the last error
    Unconfirmed(String),
}

impl LogoutOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, LogoutOutcome::Confirmed)
    }
}

#[derive(Clone)]
pub struct SessionGateway {
    client: ApiClient,
    session: Session,
    navigator: Arc<dyn Navigator>,
    refresher: Arc<RefreshCoordinator>,
}

impl SessionGateway {
    pub fn new(client: ApiClient, session: Session, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            session,
            navigator,
            refresher: Arc::new(RefreshCoordinator::new()),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send a request with the stored access token, refreshing and
    /// replaying it once if the API answers 401.
    ///
    /// Any other failure is returned unchanged. If the refresh fails the
    /// session is cleared and `ApiError::SessionExpired` is returned.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let result = self.dispatch(request).await;
        if matches!(result, Err(ApiError::SessionExpired(_))) {
            self.end_session();
        }
        result
    }

    /// Attach, send, and on a first 401 refresh and replay. No side effects
    /// on refresh failure; callers decide how the session ends.
    async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.session.access_token();
        match self.client.execute(&request, token.as_deref()).await {
            Err(ApiError::Unauthorized) => {}
            other => return other,
        }

        if !request.mark_retried() {
            return Err(ApiError::Unauthorized);
        }
        debug!(
            method = %request.method(),
            path = request.path(),
            "Request unauthorized, refreshing access token"
        );

        let token = self
            .refresher
            .refresh(&self.client, &self.session)
            .await
            .map_err(ApiError::SessionExpired)?;

        // Replayed exactly once; a second 401 is returned to the caller
        self.client.execute(&request, Some(&token)).await
    }

    /// Clear the local session and send the user to log in again
    fn end_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
        info!("Session ended, redirecting to login");
        self.navigator.redirect(LOGIN_PATH);
    }

    /// Mint a new access token outside of a failed request.
    ///
    /// Same terminal handling as [`send`](Self::send): a failed refresh
    /// clears the session and redirects to login.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        match self.refresher.refresh(&self.client, &self.session).await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.end_session();
                Err(ApiError::SessionExpired(e))
            }
        }
    }

    // ===== Auth Flows =====

    /// Sign in and persist the credential bundle
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialBundle, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let bundle = self.client.login(&request).await?;
        self.store_bundle(&bundle)?;
        info!(username = %bundle.user.username, role = %bundle.user.role, "Signed in");
        Ok(bundle)
    }

    /// Create an account and persist the credential bundle
    pub async fn register(&self, request: &RegisterRequest) -> Result<CredentialBundle, ApiError> {
        let bundle = self.client.register(request).await?;
        self.store_bundle(&bundle)?;
        info!(username = %bundle.user.username, "Registered and signed in");
        Ok(bundle)
    }

    fn store_bundle(&self, bundle: &CredentialBundle) -> Result<(), ApiError> {
        self.session
            .save_bundle(bundle)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))
    }

    fn store_user(&self, user: &UserSummary) -> Result<(), ApiError> {
        self.session
            .set_user(user)
            .map_err(|e| ApiError::Storage(format!("{:#}", e)))
    }

    // ===== Current User =====

    /// Fetch the signed-in user from the API and replace the stored copy
    pub async fn current_user(&self) -> Result<UserSummary, ApiError> {
        let response: CurrentUserResponse = self.get_json(USERS_CURRENT_PATH).await?;
        self.store_user(&response.user)?;
        debug!(username = %response.user.username, role = %response.user.role, "Stored current user");
        Ok(response.user)
    }

    /// Update the signed-in user's profile and store the user the API returns
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserSummary, ApiError> {
        let response: CurrentUserResponse = self.put_json(USERS_CURRENT_PATH, update).await?;
        self.store_user(&response.user)?;
        info!(username = %response.user.username, "Profile updated");
        Ok(response.user)
    }

    /// Fetch the current user and fail with `AccessDenied` unless they are an admin
    pub async fn require_admin(&self) -> Result<UserSummary, ApiError> {
        let user = self.current_user().await?;
        if !user.is_admin() {
            warn!(username = %user.username, "Admin area requested by non-admin");
            return Err(ApiError::AccessDenied("admin role required".to_string()));
        }
        Ok(user)
    }

    /// Log out on the server, then clear the local session no matter what.
    ///
    /// A 401 from the logout call refreshes and retries it once. Whatever
    /// the server says, both session keys are removed and the navigator is
    /// sent to login.
    pub async fn logout(&self) -> LogoutOutcome {
        info!("Logging out");
        let outcome = match self.dispatch(ApiRequest::post(AUTH_LOGOUT_PATH)).await {
            Ok(_) => LogoutOutcome::Confirmed,
            Err(e) => {
                warn!(error = %e, "Server did not confirm logout");
                LogoutOutcome::Unconfirmed(e.to_string())
            }
        };
        self.end_session();
        outcome
    }

    // ===== JSON Helpers =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::patch(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }
}
