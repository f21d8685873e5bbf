//! Unified error type for IoTWatch.

use iotwatch_protocol::ProtocolError;
use iotwatch_session::{SessionError, StoreError};
use iotwatch_telemetry::TelemetryError;
use iotwatch_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `iotwatch` crate, you deal with this single error type
/// instead of importing errors from each layer. `?` converts sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum IotWatchError {
    /// A transport-level error (bad address, client construction).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (login rejected, unauthorized).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The credential store could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The telemetry client is gone.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The configuration file is not valid TOML for [`ClientConfig`].
    ///
    /// [`ClientConfig`]: crate::ClientConfig
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// No credentials path was configured and the platform has no
    /// config directory to fall back to.
    #[error("no location for the credential store")]
    NoCredentialsPath,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::InvalidAddress("ftp://nope".into());
        let wrapped: IotWatchError = err.into();
        assert!(matches!(wrapped, IotWatchError::Transport(_)));
        assert!(wrapped.to_string().contains("ftp://nope"));
    }

    #[test]
    fn test_from_session_error() {
        let wrapped: IotWatchError = SessionError::Unauthorized.into();
        assert!(matches!(wrapped, IotWatchError::Session(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Corrupt("not json".into());
        let wrapped: IotWatchError = err.into();
        assert!(matches!(wrapped, IotWatchError::Store(_)));
    }

    #[test]
    fn test_from_telemetry_error() {
        let wrapped: IotWatchError = TelemetryError::ClientClosed.into();
        assert!(matches!(wrapped, IotWatchError::Telemetry(_)));
    }

    #[test]
    fn test_from_toml_error_mentions_configuration() {
        let err = toml::from_str::<toml::Table>("= broken").unwrap_err();
        let wrapped: IotWatchError = err.into();
        assert!(matches!(wrapped, IotWatchError::Config(_)));
        assert!(wrapped.to_string().starts_with("invalid configuration"));
    }
}
