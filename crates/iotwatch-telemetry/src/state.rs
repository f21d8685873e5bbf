//! What the telemetry client exposes to the rest of the app.

use std::fmt;

use iotwatch_protocol::SensorReading;

/// Health of the broker link.
///
/// ```text
/// Idle ──start()──→ Connecting ──→ Connected ──(link lost)──→ Reconnecting ──→ Connected
///                       │                                          │
///                       └───────(retry budget spent)──→ Failed ←───┘
///
/// Failed ──reconnect()──→ Connecting
/// ```
///
/// `stop()` returns to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic retries have stopped. Call `reconnect()` to try again.
    Failed,
}

impl ConnectionState {
    /// `true` while a connection exists or is being worked on.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Which part of the pipeline produced a [`TelemetryFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A payload could not be decoded. The link is unaffected.
    Decode,
    /// Connecting, subscribing, or staying connected failed.
    Link,
}

/// The most recent telemetry problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFault {
    pub kind: FaultKind,
    pub message: String,
}

impl TelemetryFault {
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Decode,
            message: message.into(),
        }
    }

    pub fn link(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Link,
            message: message.into(),
        }
    }
}

impl fmt::Display for TelemetryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::Decode => write!(f, "decode error: {}", self.message),
            FaultKind::Link => write!(f, "link error: {}", self.message),
        }
    }
}

/// Everything a consumer needs to render live telemetry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub state: ConnectionState,
    /// Latest successfully decoded reading. Kept across reconnects.
    pub reading: Option<SensorReading>,
    pub fault: Option<TelemetryFault>,
}

impl TelemetrySnapshot {
    /// Clears the fault if it is of `kind`. Returns whether anything changed.
    pub(crate) fn clear_fault(&mut self, kind: FaultKind) -> bool {
        if self.fault.as_ref().is_some_and(|f| f.kind == kind) {
            self.fault = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active_only_for_live_states() {
        assert!(!ConnectionState::Idle.is_active());
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Failed.is_active());
    }

    #[test]
    fn test_clear_fault_only_matching_kind() {
        let mut snapshot = TelemetrySnapshot {
            fault: Some(TelemetryFault::decode("bad payload")),
            ..TelemetrySnapshot::default()
        };
        assert!(!snapshot.clear_fault(FaultKind::Link));
        assert!(snapshot.fault.is_some());
        assert!(snapshot.clear_fault(FaultKind::Decode));
        assert!(snapshot.fault.is_none());
    }

    #[test]
    fn test_fault_display_names_kind() {
        assert_eq!(
            TelemetryFault::link("refused").to_string(),
            "link error: refused"
        );
    }
}
