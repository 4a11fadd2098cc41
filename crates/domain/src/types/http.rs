//! Request and response envelopes exchanged with the transport port.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::ClientError;
use crate::impl_state_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

/// An outbound protected-resource call.
///
/// `path` is either absolute (`https://...`) or relative to the configured
/// base URL. The `Authorization` header is attached by the pipeline on every
/// attempt, so callers never set it themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// POST with a JSON body.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidRequest` if `body` cannot be serialized.
    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, ClientError> {
        Self::new(HttpMethod::Post, path).with_json(body)
    }

    /// Attach a JSON body and content type.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidRequest` if `body` cannot be serialized.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.body = Some(bytes);
        Ok(self.header("content-type", "application/json"))
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response as seen by the pipeline. Header names are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self { status, ..Self::default() }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidRequest` when the body does not decode.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ClientError::InvalidRequest(format!("response body: {e}")))
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

/// Outcome category of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Success,
    AuthFailure,
    TransientFailure,
    PermanentFailure,
    Cancelled,
}

impl_state_conversions!(Classification {
    Success => "success",
    AuthFailure => "auth_failure",
    TransientFailure => "transient_failure",
    PermanentFailure => "permanent_failure",
    Cancelled => "cancelled",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = ApiRequest::get("/me").header("X-Trace", "abc");
        assert_eq!(request.header_value("x-trace"), Some("abc"));

        let response = ApiResponse::new(401).with_header("WWW-Authenticate", "Bearer");
        assert_eq!(response.header("www-authenticate"), Some("Bearer"));
        assert_eq!(response.headers[0].0, "www-authenticate");
    }

    #[test]
    fn post_json_sets_body_and_content_type() {
        let request = ApiRequest::post_json("/items", &serde_json::json!({"name": "a"})).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"a"}"#.as_slice()));
    }

    #[test]
    fn response_json_decodes() {
        let response = ApiResponse::new(200).with_body(r#"{"id": 7}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
        assert!(response.is_success());
    }

    #[test]
    fn classification_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!(Classification::TransientFailure.to_string(), "transient_failure");
        assert_eq!(Classification::from_str("AUTH_FAILURE").unwrap(), Classification::AuthFailure);
    }
}
