//! Error types for the session layer.

use iotwatch_protocol::RequestOutcome;

/// Errors from the durable credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but can't be parsed.
    #[error("credential store is corrupt: {0}")]
    Corrupt(String),
}

/// Why a login, registration, or other session operation failed.
///
/// A failed operation never changes the current session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend refused the request (wrong password, email taken,
    /// validation error). `message` is the backend's own text.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The backend rejected the bearer credential.
    #[error("{}", iotwatch_protocol::UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    /// The backend could not be reached or answered with garbage.
    #[error("transport error: {0}")]
    Transport(String),

    /// The token could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Converts a pipeline outcome into a `Result`.
    pub fn from_outcome<T>(outcome: RequestOutcome<T>) -> Result<T, Self> {
        match outcome {
            RequestOutcome::Success(value) => Ok(value),
            RequestOutcome::Unauthorized => Err(Self::Unauthorized),
            RequestOutcome::ClientError { status, message } => {
                Err(Self::Rejected { status, message })
            }
            RequestOutcome::TransportError(message) => Err(Self::Transport(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_outcome_success_is_ok() {
        assert_eq!(SessionError::from_outcome(RequestOutcome::Success(5)).unwrap(), 5);
    }

    #[test]
    fn test_from_outcome_client_error_keeps_backend_message() {
        let err = SessionError::from_outcome::<()>(RequestOutcome::ClientError {
            status: 401,
            message: "Invalid email or password".into(),
        })
        .unwrap_err();
        assert!(matches!(err, SessionError::Rejected { status: 401, .. }));
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_from_outcome_transport_error() {
        let err =
            SessionError::from_outcome::<()>(RequestOutcome::TransportError("down".into()))
                .unwrap_err();
        assert!(matches!(err, SessionError::Transport(m) if m == "down"));
    }

    #[test]
    fn test_store_error_converts_into_session_error() {
        let err: SessionError = StoreError::Corrupt("bad json".into()).into();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(err.to_string().contains("bad json"));
    }
}
