//! Error types for the protocol layer.
//!
//! Each crate in IoTWatch defines its own error enum. A `ProtocolError`
//! always means the bytes were reachable but their content was wrong.

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// or wrong data types.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload parsed but violates protocol rules, e.g. a paged
    /// response that arrived as a bare array.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A telemetry payload could not be turned into a reading.
    #[error("invalid reading: {0}")]
    InvalidReading(String),
}
