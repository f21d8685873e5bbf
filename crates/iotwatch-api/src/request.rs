//! Requests as the pipeline sees them, before the token is attached.

use std::time::Duration;

use iotwatch_protocol::{Codec, JsonCodec, ProtocolError};
use iotwatch_transport::Method;
use serde::{Deserialize, Serialize};

/// Whether a request carries the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Attach the current token, if any. A 401 invalidates the session.
    #[default]
    Bearer,
    /// Never attach a token. A 401 is an ordinary client error
    /// (e.g. wrong password) and leaves the session alone.
    Anonymous,
}

/// One logical API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth: AuthMode::Bearer,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Sets a raw JSON body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, ProtocolError> {
        let body = JsonCodec.encode(value)?;
        Ok(self.body(body))
    }

    /// Sends the request without a bearer token.
    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }
}

/// REST backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme, host and optional port, e.g. `https://iot.example.com`.
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_to_bearer_without_body() {
        let request = ApiRequest::get("/api/thresholds");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.auth, AuthMode::Bearer);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_json_serializes_body() {
        let request = ApiRequest::post("/api/thresholds")
            .json(&serde_json::json!({ "value": 30.0 }))
            .unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"value":30.0}"#));
    }

    #[test]
    fn test_anonymous_sets_auth_mode() {
        let request = ApiRequest::post("/api/auth/login").anonymous();
        assert_eq!(request.auth, AuthMode::Anonymous);
    }

    #[test]
    fn test_config_default_timeout() {
        assert_eq!(ApiConfig::default().request_timeout(), Duration::from_secs(10));
    }
}
