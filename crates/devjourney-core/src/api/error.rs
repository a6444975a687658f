use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The refresh call failed; the local session has been cleared.
    #[error("Session expired: {0}")]
    SessionExpired(#[source] Arc<ApiError>),

    #[error("Session storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if matches!(status.as_u16(), 400 | 409 | 422) {
            if let Some(errors) = ValidationErrors::parse(body) {
                return ApiError::Validation(errors);
            }
        }

        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True for the one status the gateway recovers from by refreshing.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

// ============================================================================
// Validation errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Structured form errors from a 4xx response, surfaced to the caller as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub message: Option<String>,
    pub fields: Vec<FieldError>,
}

#[derive(Deserialize)]
struct RawValidationBody {
    message: Option<String>,
    errors: Option<RawErrors>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawErrors {
    List(Vec<RawFieldError>),
    Map(BTreeMap<String, RawMessages>),
}

#[derive(Deserialize)]
struct RawFieldError {
    #[serde(alias = "path", alias = "param")]
    field: Option<String>,
    #[serde(alias = "msg")]
    message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessages {
    One(String),
    Many(Vec<String>),
}

impl ValidationErrors {
    /// Parse a validation body. Returns `None` unless it carries at least
    /// one field error.
    pub fn parse(body: &str) -> Option<Self> {
        let raw: RawValidationBody = serde_json::from_str(body).ok()?;
        let fields: Vec<FieldError> = match raw.errors? {
            RawErrors::List(items) => items
                .into_iter()
                .map(|e| FieldError {
                    field: e.field.unwrap_or_default(),
                    message: e.message,
                })
                .collect(),
            RawErrors::Map(map) => map
                .into_iter()
                .flat_map(|(field, messages)| {
                    let messages = match messages {
                        RawMessages::One(m) => vec![m],
                        RawMessages::Many(ms) => ms,
                    };
                    messages.into_iter().map(move |message| FieldError {
                        field: field.clone(),
                        message,
                    })
                })
                .collect(),
        };

        if fields.is_empty() {
            return None;
        }

        Some(Self {
            message: raw.message,
            fields,
        })
    }

    /// Messages for one form field, in the order the server sent them.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(ref message) = self.message {
            parts.push(message.clone());
        }
        for e in &self.fields {
            if e.field.is_empty() {
                parts.push(e.message.clone());
            } else {
                parts.push(format!("{}: {}", e.field, e.message));
            }
        }
        if parts.is_empty() {
            write!(f, "invalid request")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "admins only"),
            ApiError::AccessDenied(ref b) if b == "admins only"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "no blog"),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_session_expired_wraps_refresh_failure() {
        let error = ApiError::SessionExpired(Arc::new(ApiError::Unauthorized));
        assert!(error.is_session_expired());
        assert!(!error.is_unauthorized());
        assert!(!ApiError::Unauthorized.is_session_expired());
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("600 total bytes"));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH);
        // Must not panic slicing through a multi-byte character
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn test_validation_list_shape() {
        let body = r#"{"errors":[{"path":"email","msg":"Email is taken"},{"field":"password","message":"Too short"}]}"#;
        match ApiError::from_status(StatusCode::BAD_REQUEST, body) {
            ApiError::Validation(errors) => {
                assert_eq!(errors.for_field("email").collect::<Vec<_>>(), vec!["Email is taken"]);
                assert_eq!(errors.for_field("password").collect::<Vec<_>>(), vec!["Too short"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_map_shape() {
        let body = r#"{"message":"Invalid input","errors":{"username":["Required","Too short"],"email":"Invalid"}}"#;
        let errors = ValidationErrors::parse(body).unwrap();
        assert_eq!(errors.message.as_deref(), Some("Invalid input"));
        assert_eq!(errors.fields.len(), 3);
        assert_eq!(
            errors.to_string(),
            "Invalid input; email: Invalid; username: Required; username: Too short"
        );
    }

    #[test]
    fn test_bad_request_without_field_errors() {
        assert!(ValidationErrors::parse(r#"{"message":"nope"}"#).is_none());
        assert!(ValidationErrors::parse(r#"{"message":"nope","errors":[]}"#).is_none());
        assert!(ValidationErrors::parse(r#"{"errors":{}}"#).is_none());
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, "not json"),
            ApiError::InvalidResponse(_)
        ));
    }
}
