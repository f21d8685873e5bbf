//! The tagged result of one authenticated API call.

use serde::de::DeserializeOwned;

use crate::Codec;

/// Message returned for [`RequestOutcome::Unauthorized`].
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Please login again.";

/// Result of a call through the request pipeline.
///
/// This is deliberately not a `Result`: every variant is an expected
/// outcome the caller should handle, and `Unauthorized` has already had
/// its side effect (session demotion) applied by the time the caller
/// sees it.
///
/// ```text
/// 2xx with body   → Success(decoded)
/// 204 / empty 2xx → Success(None)            (for Option payloads)
/// 401 (bearer)    → Unauthorized
/// other status    → ClientError { status, message }
/// no response     → TransportError(message)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    /// The backend accepted the request.
    Success(T),

    /// The backend rejected the bearer credential.
    Unauthorized,

    /// The backend answered with a non-success status.
    ClientError { status: u16, message: String },

    /// No usable response: connectivity, timeout, or unreadable body.
    TransportError(String),
}

impl<T> RequestOutcome<T> {
    /// `true` for [`RequestOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the payload if the call succeeded.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Transforms the success payload, leaving failures untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        match self {
            Self::Success(value) => RequestOutcome::Success(f(value)),
            Self::Unauthorized => RequestOutcome::Unauthorized,
            Self::ClientError { status, message } => {
                RequestOutcome::ClientError { status, message }
            }
            Self::TransportError(message) => RequestOutcome::TransportError(message),
        }
    }

    /// Chains a fallible step onto the success payload.
    pub fn and_then<U>(
        self,
        f: impl FnOnce(T) -> RequestOutcome<U>,
    ) -> RequestOutcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Unauthorized => RequestOutcome::Unauthorized,
            Self::ClientError { status, message } => {
                RequestOutcome::ClientError { status, message }
            }
            Self::TransportError(message) => RequestOutcome::TransportError(message),
        }
    }

    /// Human-readable failure reason, or `None` on success.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success(_) => None,
            Self::Unauthorized => Some(UNAUTHORIZED_MESSAGE.to_string()),
            Self::ClientError { message, .. } => Some(message.clone()),
            Self::TransportError(message) => Some(message.clone()),
        }
    }
}

impl RequestOutcome<Option<serde_json::Value>> {
    /// Decodes a JSON success payload into `T`.
    ///
    /// An empty success or a payload that doesn't match `T` becomes a
    /// `TransportError`: the backend answered, but not with anything usable.
    pub fn decode<T: DeserializeOwned>(self, codec: &impl Codec) -> RequestOutcome<T> {
        self.and_then(|payload| match payload {
            Some(value) => match codec.from_value(value) {
                Ok(decoded) => RequestOutcome::Success(decoded),
                Err(e) => {
                    RequestOutcome::TransportError(format!("invalid response body: {e}"))
                }
            },
            None => RequestOutcome::TransportError(
                "invalid response body: expected content, got none".into(),
            ),
        })
    }
}
