//! HTTP transport implementation using `reqwest`.

use std::future::Future;
use std::time::Duration;

use crate::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// An [`HttpTransport`] that sends requests to one backend base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Builds a transport for `base_url` whose requests give up after
    /// `timeout`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(TransportError::InvalidAddress(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        tracing::debug!(base_url, ?timeout, "HTTP transport ready");
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// The base URL every request path is appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl HttpTransport for ReqwestTransport {
    fn call(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        async move {
            let url = format!("{}{}", self.base_url, request.path);
            let mut builder =
                self.client.request(request.method.into(), url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(map_error)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(map_error)?;

            tracing::trace!(method = %request.method, %url, status, "HTTP call finished");
            Ok(HttpResponse { status, body })
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::ConnectFailed(e.to_string())
    } else {
        TransportError::RequestFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let transport =
            ReqwestTransport::new("http://localhost:3000/", Duration::from_secs(1))
                .expect("valid url");
        assert_eq!(transport.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_new_rejects_non_http_scheme() {
        let result = ReqwestTransport::new("ftp://example.com", Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::InvalidAddress(_))));
    }

    #[test]
    fn test_method_converts_to_reqwest() {
        assert_eq!(reqwest::Method::from(Method::Put), reqwest::Method::PUT);
        assert_eq!(reqwest::Method::from(Method::Delete), reqwest::Method::DELETE);
    }

    #[tokio::test]
    async fn test_call_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening.
        let transport =
            ReqwestTransport::new("http://127.0.0.1:9", Duration::from_secs(2))
                .expect("valid url");
        let result = transport
            .call(HttpRequest {
                method: Method::Get,
                path: "/api/auth/profile".into(),
                headers: Vec::new(),
                body: None,
            })
            .await;
        assert!(result.is_err());
    }
}
