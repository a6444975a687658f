use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::{CredentialBundle, UserSummary};

use super::store::{MemoryStore, SessionKey, SessionStore};

/// The client-side session: a narrow read/write/clear view over a
/// [`SessionStore`]. Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// A session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Get the bearer token if one is stored
    pub fn access_token(&self) -> Option<String> {
        self.store
            .get(SessionKey::AccessToken)
            .filter(|t| !t.is_empty())
    }

    /// Get the stored user, if present and readable
    pub fn user(&self) -> Option<UserSummary> {
        let raw = self.store.get(SessionKey::User)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored user");
                None
            }
        }
    }

    /// Token and user together, only when both are present
    pub fn bundle(&self) -> Option<CredentialBundle> {
        Some(CredentialBundle {
            access_token: self.access_token()?,
            user: self.user()?,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Persist a full credential bundle after login or register
    pub fn save_bundle(&self, bundle: &CredentialBundle) -> Result<()> {
        let user = serde_json::to_string(&bundle.user).context("Failed to serialize user")?;
        self.store.set(SessionKey::AccessToken, &bundle.access_token)?;
        self.store.set(SessionKey::User, &user)?;
        Ok(())
    }

    /// Replace only the stored user, after a profile fetch or update
    pub fn set_user(&self, user: &UserSummary) -> Result<()> {
        let user = serde_json::to_string(user).context("Failed to serialize user")?;
        self.store.set(SessionKey::User, &user)
    }

    /// Replace only the access token, as a refresh does
    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.store.set(SessionKey::AccessToken, token)
    }

    /// Remove both session keys.
    ///
    /// Every key is attempted even if an earlier removal fails; the first
    /// error is returned.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in SessionKey::ALL {
            if let Err(e) = self.store.remove(key) {
                warn!(key = key.as_str(), error = %e, "Failed to remove session key");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
