//! Request and response descriptors passed through the session gateway.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ApiError;

/// An outbound API call. The path is relative to the configured API base URL.
///
/// The gateway only ever touches the `Authorization` header and the private
/// retry flag; everything else is sent as the caller built it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Flag this request as replayed. Returns false if it already was.
    pub(crate) fn mark_retried(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }
}

/// A successful (2xx) API response, fully buffered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_retried_only_once() {
        let mut request = ApiRequest::get("/blogs");
        assert!(request.mark_retried());
        assert!(!request.mark_retried());
        // Clones carry the flag with them
        assert!(!request.clone().mark_retried());
    }

    #[test]
    fn test_builders() {
        let request = ApiRequest::post("/blogs")
            .json(&serde_json::json!({ "title": "Hello" }))
            .unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.path(), "/blogs");
        assert_eq!(request.body().unwrap()["title"], "Hello");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_response_json_error() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: b"<html>".to_vec(),
        };
        let parsed: Result<serde_json::Value, _> = response.json();
        assert!(matches!(parsed, Err(ApiError::InvalidResponse(_))));
        assert_eq!(response.text(), "<html>");
    }
}
