//! The one place requests get a bearer token and 401s get handled.
//!
//! ```text
//! ApiRequest ──→ attach headers ──→ HttpTransport ──→ map status ──→ RequestOutcome
//!                   ↑                                     │
//!            session snapshot                   401 (bearer) → invalidate session
//! ```

use std::sync::Arc;

use iotwatch_protocol::{Codec, JsonCodec, RequestOutcome};
use iotwatch_session::{CredentialStore, SessionHandle};
use iotwatch_transport::{HttpRequest, HttpResponse, HttpTransport};
use serde_json::Value;

use crate::{ApiRequest, AuthMode};

const UNAUTHORIZED: u16 = 401;
const NO_CONTENT: u16 = 204;

/// Executes [`ApiRequest`]s against the backend.
///
/// Cheap to clone: the transport is behind an `Arc` and the session
/// handle is itself shared.
pub struct RequestPipeline<H, S> {
    http: Arc<H>,
    session: SessionHandle<S>,
    codec: JsonCodec,
}

impl<H, S> Clone for RequestPipeline<H, S> {
    fn clone(&self) -> Self {
        Self {
            http: Arc::clone(&self.http),
            session: self.session.clone(),
            codec: self.codec,
        }
    }
}

impl<H: HttpTransport, S: CredentialStore> RequestPipeline<H, S> {
    pub fn new(http: Arc<H>, session: SessionHandle<S>) -> Self {
        Self {
            http,
            session,
            codec: JsonCodec,
        }
    }

    pub fn session(&self) -> &SessionHandle<S> {
        &self.session
    }

    /// Sends `request` and maps the response:
    ///
    /// - transport failure → `TransportError`
    /// - 401 on a bearer request → session invalidated, then `Unauthorized`
    /// - other non-2xx → `ClientError` with the backend's message
    /// - 204 or empty 2xx → `Success(None)`
    /// - any other 2xx → `Success(Some(json))`, or `TransportError` if the
    ///   body isn't JSON
    pub async fn execute(&self, request: ApiRequest) -> RequestOutcome<Option<Value>> {
        let auth = request.auth;
        let method = request.method;
        let path = request.path.clone();
        let prepared = self.prepare(request);

        let response = match self.http.call(prepared).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%method, %path, error = %e, "request failed");
                return RequestOutcome::TransportError(e.to_string());
            }
        };
        tracing::debug!(%method, %path, status = response.status, "response received");

        if response.status == UNAUTHORIZED && auth == AuthMode::Bearer {
            tracing::warn!(%method, %path, "bearer token rejected, dropping session");
            self.session.invalidate("unauthorized response").await;
            return RequestOutcome::Unauthorized;
        }

        self.map_response(response)
    }

    fn prepare(&self, request: ApiRequest) -> HttpRequest {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if request.auth == AuthMode::Bearer {
            if let Some(token) = self.session.token() {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
        }

        HttpRequest {
            method: request.method,
            path: request.path,
            headers,
            body: request.body,
        }
    }

    fn map_response(&self, response: HttpResponse) -> RequestOutcome<Option<Value>> {
        if !response.is_success() {
            return RequestOutcome::ClientError {
                status: response.status,
                message: error_message(&response),
            };
        }

        if response.status == NO_CONTENT || response.body.trim().is_empty() {
            return RequestOutcome::Success(None);
        }

        match self.codec.decode::<Value>(&response.body) {
            Ok(value) => RequestOutcome::Success(Some(value)),
            Err(e) => RequestOutcome::TransportError(format!("invalid response body: {e}")),
        }
    }
}

/// Picks the most useful text out of an error response: a JSON `message`
/// or `error` string, else the raw body, else a status-derived fallback.
fn error_message(response: &HttpResponse) -> String {
    let body = response.body.trim();
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = fields.get(key) {
                if !message.is_empty() {
                    return message.clone();
                }
            }
        }
    }
    if body.is_empty() {
        format!("request failed with status {}", response.status)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_message() {
        let response = HttpResponse::new(400, r#"{"message":"Email already registered"}"#);
        assert_eq!(error_message(&response), "Email already registered");
    }

    #[test]
    fn test_error_message_falls_back_to_error_field() {
        let response = HttpResponse::new(422, r#"{"error":"value must be a number"}"#);
        assert_eq!(error_message(&response), "value must be a number");
    }

    #[test]
    fn test_error_message_plain_text_body() {
        let response = HttpResponse::new(500, "  Internal Server Error\n");
        assert_eq!(error_message(&response), "Internal Server Error");
    }

    #[test]
    fn test_error_message_empty_body_uses_status() {
        let response = HttpResponse::new(404, "");
        assert_eq!(error_message(&response), "request failed with status 404");
    }

    #[test]
    fn test_error_message_json_without_known_fields_uses_body() {
        let response = HttpResponse::new(409, r#"{"code":7}"#);
        assert_eq!(error_message(&response), r#"{"code":7}"#);
    }
}
