//! Session types: the data that says who is using the client.
//!
//! A "session" is the client's record of its authentication context:
//! - WHO the user is (`UserProfile`, once confirmed by the backend)
//! - WHAT mode the app is in (unresolved, guest, authenticated)
//! - HOW outbound calls prove identity (an opaque bearer token)

use std::fmt;
use std::time::Duration;

use iotwatch_protocol::UserProfile;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key under which the bearer token is kept in the credential store.
    pub token_key: String,

    /// Upper bound on the startup profile check. A timeout is treated like
    /// any other validation failure: the client falls back to guest.
    pub validation_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_key: "authToken".to_string(),
            validation_timeout_ms: 8_000,
        }
    }
}

impl SessionConfig {
    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// SessionMode
// ---------------------------------------------------------------------------

/// What the rest of the application may assume about the user.
///
/// ```text
///   Unresolved ──(no token / rejected)──→ Guest ←──(logout / 401)──┐
///       │                                   │                      │
///       └──(token confirmed)──→ Authenticated ←──(login/register)──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    /// Startup check not finished yet.
    Unresolved,
    /// No valid credential. Only public features are available.
    Guest,
    /// Token present and confirmed against the backend.
    Authenticated,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => write!(f, "Unresolved"),
            Self::Guest => write!(f, "Guest"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The current authentication context.
///
/// Fields are private so the invariant holds by construction:
/// `mode == Authenticated` exactly when both `token` and `user` are
/// present. A token without a user only exists in the `Unresolved`
/// validating state.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<UserProfile>,
    mode: SessionMode,
}

impl Session {
    /// The state before the startup check runs.
    pub fn unresolved() -> Self {
        Self {
            token: None,
            user: None,
            mode: SessionMode::Unresolved,
        }
    }

    /// No credential.
    pub fn guest() -> Self {
        Self {
            token: None,
            user: None,
            mode: SessionMode::Guest,
        }
    }

    /// A stored token is being checked against the backend.
    pub(crate) fn validating(token: String) -> Self {
        Self {
            token: Some(token),
            user: None,
            mode: SessionMode::Unresolved,
        }
    }

    /// A token the backend has accepted for `user`.
    pub(crate) fn authenticated(token: String, user: UserProfile) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
            mode: SessionMode::Authenticated,
        }
    }

    /// `true` while `token` is the stored token being checked.
    pub(crate) fn is_validating(&self, token: &str) -> bool {
        self.mode == SessionMode::Unresolved && self.token.as_deref() == Some(token)
    }

    /// The bearer token, if any. Present while authenticated and while a
    /// stored token is being validated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_authenticated(&self) -> bool {
        self.mode == SessionMode::Authenticated
    }

    pub fn is_guest(&self) -> bool {
        self.mode == SessionMode::Guest
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unresolved()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}
