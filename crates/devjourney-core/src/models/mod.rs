//! Data models for DevJourney authentication payloads.
//!
//! This module contains the structures the session gateway reads and
//! writes. Everything else the REST API returns (blogs, comments, likes,
//! subscribers) is passed through as opaque JSON.
//!
//! - `UserSummary`, `Role`: the signed-in user as reported by the API
//! - `CredentialBundle`: access token plus user, persisted client-side
//! - `LoginRequest`, `RegisterRequest`: auth form payloads
//! - `ProfileUpdate`, `CurrentUserResponse`: the current-user endpoint

pub mod auth;
pub mod user;

pub use auth::{
    CredentialBundle, CurrentUserResponse, LoginRequest, ProfileUpdate, RefreshResponse,
    RegisterRequest,
};
pub use user::{Role, UserSummary};
