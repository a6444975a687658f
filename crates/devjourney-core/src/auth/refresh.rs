//! Single-flight access-token refresh.
//!
//! Any number of callers that hit a 401 at the same time share one call to
//! the refresh endpoint and all observe its outcome.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};

use super::Session;

/// New access token, or the shared reason the refresh failed
pub type RefreshOutcome = Result<String, Arc<ApiError>>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh the access token, joining a refresh already in progress.
    ///
    /// On success the new token is written to the session. On failure the
    /// session is left untouched; clearing it is up to the caller.
    pub async fn refresh(&self, client: &ApiClient, session: &Session) -> RefreshOutcome {
        let refresh = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            // A settled refresh left behind by a cancelled caller is never reused
            match slot.as_ref().filter(|existing| existing.peek().is_none()) {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let started = Self::start(client.clone(), session.clone());
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let outcome = refresh.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }

        outcome
    }

    fn start(client: ApiClient, session: Session) -> InFlight {
        async move {
            info!("Refreshing access token");
            let token = match client.refresh_token().await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Access token refresh failed");
                    return Err(Arc::new(e));
                }
            };

            session
                .set_access_token(&token)
                .map_err(|e| Arc::new(ApiError::Storage(format!("{:#}", e))))?;
            debug!("Stored refreshed access token");
            Ok(token)
        }
        .boxed()
        .shared()
    }
}
