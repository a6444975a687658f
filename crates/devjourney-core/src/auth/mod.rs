//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `Session`: read/write/clear view over the persisted credential bundle
//! - `SessionStore`: key-value backends (`MemoryStore`, `FileStore`)
//! - `RefreshCoordinator`: single-flight access-token refresh
//! - `CredentialStore`: OS keychain storage for the refresh cookie
//!
//! Access tokens carry no expiry metadata; expiry is discovered when the
//! API answers 401.

pub mod credentials;
pub mod refresh;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use session::Session;
pub use store::{FileStore, MemoryStore, SessionKey, SessionStore};
