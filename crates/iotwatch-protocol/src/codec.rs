//! Codec trait and implementations for serializing/deserializing bodies.
//!
//! The API layer doesn't care how request and response bodies are
//! serialized; it just needs something that implements [`Codec`]. The
//! backend speaks JSON, so [`JsonCodec`] is the one implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to text and decode text back.
///
/// `Send + Sync + 'static` because the codec lives inside long-lived,
/// shared API clients.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a request body.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a response body back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or doesn't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, ProtocolError>;

    /// Converts an already-parsed JSON value into a typed value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the value doesn't match `T`.
    fn from_value<T: DeserializeOwned>(
        &self,
        value: serde_json::Value,
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use iotwatch_protocol::{Codec, Credentials, JsonCodec};
///
/// let codec = JsonCodec;
/// let body = codec
///     .encode(&Credentials::new("a@b.com", "secret1"))
///     .unwrap();
/// assert!(body.contains("\"email\":\"a@b.com\""));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(data).map_err(ProtocolError::Decode)
    }

    fn from_value<T: DeserializeOwned>(
        &self,
        value: serde_json::Value,
    ) -> Result<T, ProtocolError> {
        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserProfile;

    #[test]
    fn test_decode_profile_from_body() {
        let profile: UserProfile = JsonCodec
            .decode(r#"{"id":1,"name":"A","email":"a@b.com"}"#)
            .expect("valid profile");
        assert_eq!(profile.id, 1);
        assert_eq!(profile.email, "a@b.com");
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn test_decode_malformed_body_returns_decode_error() {
        let result: Result<UserProfile, _> = JsonCodec.decode("{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_from_value_wrong_shape_returns_decode_error() {
        let result: Result<UserProfile, _> =
            JsonCodec.from_value(serde_json::json!([1, 2, 3]));
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
