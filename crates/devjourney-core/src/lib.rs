//! Core library for the DevJourney blog platform client.
//!
//! Every call to the DevJourney REST API goes through [`SessionGateway`],
//! which attaches the stored access token and transparently refreshes it
//! once when the API reports it expired.

pub mod api;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse};
pub use auth::{CredentialStore, FileStore, MemoryStore, Session, SessionStore};
pub use config::Config;
pub use gateway::{LogNavigator, LogoutOutcome, Navigator, SessionGateway, LOGIN_PATH};
pub use models::{CredentialBundle, ProfileUpdate, RegisterRequest, Role, UserSummary};
