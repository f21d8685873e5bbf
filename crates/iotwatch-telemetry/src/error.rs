//! Error types for the telemetry client.

/// Errors returned by [`TelemetryClient`](crate::TelemetryClient) methods.
///
/// Connection and decode failures are never returned: they show up in the
/// [`TelemetrySnapshot`](crate::TelemetrySnapshot) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    /// The client task has shut down.
    #[error("telemetry client is closed")]
    ClientClosed,
}
