//! REST API client module for the DevJourney platform.
//!
//! This module provides the `ApiClient` transport for communicating with
//! the DevJourney API, plus the request/response descriptors and the typed
//! `ApiError` every caller matches on.
//!
//! The API uses bearer access tokens for data endpoints and an httponly
//! refresh-token cookie, held in the client's cookie jar, to mint new ones.

pub mod client;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::{ApiError, FieldError, ValidationErrors};
pub use request::{ApiRequest, ApiResponse};
pub use reqwest::Method;
