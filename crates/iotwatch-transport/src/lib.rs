//! Transport abstraction layer for IoTWatch.
//!
//! Provides the [`HttpTransport`] trait for request/response calls and
//! the [`Broker`] / [`BrokerLink`] pair for publish/subscribe telemetry.
//! Everything above this crate talks to the network only through these
//! traits, so tests can swap in scripted mocks.
//!
//! # Feature Flags
//!
//! - `http` (default): [`ReqwestTransport`] via `reqwest`
//! - `mqtt` (default): [`MqttBroker`] via `rumqttc`

mod error;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::ReqwestTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttBroker, MqttConfig, MqttLink};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

/// Counter for generating unique link IDs.
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A fully prepared request: the transport sends it as-is.
///
/// `path` is relative to whatever base address the transport was built
/// with (e.g. `/api/auth/profile`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Returns the value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status code and raw text body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Creates a response from a status code and body text.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs request/response calls against the backend.
///
/// A transport-level failure (DNS, refused connection, timeout) is an
/// `Err`. Any response that arrived, whatever its status, is an `Ok`.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends `request` and waits for the full response body.
    fn call(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Opaque identifier for one broker link (one successful connect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    /// Creates a new `LinkId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique `LinkId`.
    pub fn next() -> Self {
        Self(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// Something the broker link reports after it has been established.
///
/// Events for one link arrive in order on the channel handed to
/// [`Broker::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A message was published on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },

    /// The link dropped. No further events follow for this link.
    LinkLost { reason: String },
}

/// Opens links to a publish/subscribe broker.
///
/// The broker address and credentials belong to the implementation's own
/// configuration; callers only ask for a fresh link.
pub trait Broker: Send + Sync + 'static {
    /// The link type produced by this broker.
    type Link: BrokerLink;

    /// Connects to the broker. Once connected, every inbound message and
    /// the eventual link loss are delivered through `events`.
    fn connect(
        &self,
        events: mpsc::Sender<BrokerEvent>,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

/// One live connection to a broker.
pub trait BrokerLink: Send + 'static {
    /// Subscribes to `topic`. Messages arrive on the link's event channel.
    fn subscribe(
        &mut self,
        topic: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the link. No events are delivered afterwards.
    fn disconnect(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this link.
    fn id(&self) -> LinkId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_id_new_and_into_inner() {
        let id = LinkId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_link_id_display() {
        assert_eq!(LinkId::new(7).to_string(), "link-7");
    }

    #[test]
    fn test_link_id_next_is_unique() {
        let a = LinkId::next();
        let b = LinkId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_method_display_is_uppercase() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_request_header_lookup_ignores_case() {
        let request = HttpRequest {
            method: Method::Get,
            path: "/api/auth/profile".into(),
            headers: vec![("Authorization".into(), "Bearer T".into())],
            body: None,
        };
        assert_eq!(request.header("authorization"), Some("Bearer T"));
        assert_eq!(request.header("content-type"), None);
    }

    #[test]
    fn test_response_is_success_covers_2xx_only() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
    }
}
