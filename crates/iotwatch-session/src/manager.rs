//! The session manager: the only writer of the session.
//!
//! It's responsible for:
//! - Resolving the startup state from the stored token ([`check_auth`])
//! - Logging in and registering, then persisting the new token
//! - Logging out
//!
//! # Concurrency note
//!
//! Network calls run without any lock held. Every "store write + state
//! change" pair runs under the handle's write lock, and validation
//! results are applied only while the session is still validating the
//! same token. Concurrent `check_auth` calls share one profile request:
//! later callers wait for the first one's result. A `logout` that lands
//! while `check_auth` is waiting on the backend therefore wins: the late
//! profile result finds a different session and is dropped.
//!
//! [`check_auth`]: SessionManager::check_auth

use std::sync::Arc;

use iotwatch_protocol::{AuthResponse, Credentials, Registration, RequestOutcome, UserProfile};
use tokio::sync::watch;

use crate::{
    AuthBackend, CredentialStore, Session, SessionError, SessionHandle, SessionMode,
};

/// Drives every session transition.
///
/// ## Lifecycle
///
/// ```text
/// check_auth() ──(no token)──────────────→ [Guest]
///      │                                     ↑   │
///      └──(token)──→ [Unresolved] ──(reject)─┘   │ login() / register()
///                         │                      ▼
///                         └──(confirmed)──→ [Authenticated] ──logout() / 401──→ [Guest]
/// ```
pub struct SessionManager<B, S> {
    handle: SessionHandle<S>,
    backend: Arc<B>,
}

impl<B, S> Clone for SessionManager<B, S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: AuthBackend, S: CredentialStore> SessionManager<B, S> {
    pub fn new(handle: SessionHandle<S>, backend: Arc<B>) -> Self {
        Self { handle, backend }
    }

    pub fn handle(&self) -> &SessionHandle<S> {
        &self.handle
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.handle.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.handle.subscribe()
    }

    /// Resolves the startup state from the credential store.
    ///
    /// - no stored token (or an unreadable store) → `Guest`, no network call
    /// - stored token → `Unresolved` while the profile is fetched, then
    ///   `Authenticated` on success or `Guest` on any failure, with the
    ///   token removed from memory and store
    ///
    /// The profile call is bounded by
    /// [`SessionConfig::validation_timeout`](crate::SessionConfig::validation_timeout);
    /// a timeout counts as a failure. Never returns an error.
    ///
    /// Once the session has resolved, further calls return the current
    /// mode without touching the store or the network. Calls made while a
    /// validation is running wait for it and return its result.
    pub async fn check_auth(&self) -> SessionMode {
        loop {
            let token = {
                let _writes = self.handle.lock_writes().await;

                let current = self.handle.current();
                match (current.mode(), current.token()) {
                    (SessionMode::Unresolved, Some(_)) => None,
                    (SessionMode::Unresolved, None) => match self.stored_token().await {
                        Some(token) => {
                            self.handle.replace(
                                Session::validating(token.clone()),
                                "validating stored token",
                            );
                            Some(token)
                        }
                        None => {
                            self.handle.replace(Session::guest(), "no stored token");
                            return SessionMode::Guest;
                        }
                    },
                    (mode, _) => {
                        tracing::debug!(%mode, "session already resolved");
                        return mode;
                    }
                }
            };

            match token {
                Some(token) => return self.validate(token).await,
                None => self.wait_for_validation().await,
            }
        }
    }

    /// Reads the stored token. An unreadable store counts as no token.
    async fn stored_token(&self) -> Option<String> {
        let key = &self.handle.config().token_key;
        let stored = match self.handle.store().get(key).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored token, continuing as guest");
                None
            }
        };
        stored.filter(|t| !t.is_empty())
    }

    /// Waits until the validation another caller started either settles
    /// or is abandoned.
    async fn wait_for_validation(&self) {
        tracing::debug!("stored token already being validated, waiting");
        let mut changes = self.handle.subscribe();
        let _ = changes
            .wait_for(|s| s.mode() != SessionMode::Unresolved || s.token().is_none())
            .await;
    }

    /// Checks `token` against the backend and applies the result.
    ///
    /// Must only be called by the caller that put the session into the
    /// validating state for `token`.
    async fn validate(&self, token: String) -> SessionMode {
        // Dropped mid-flight (caller cancelled): hand the check back so a
        // later caller can retry instead of waiting forever.
        let _abandon = AbandonOnDrop {
            handle: &self.handle,
            token: &token,
        };

        let timeout = self.handle.config().validation_timeout();
        let outcome = match tokio::time::timeout(timeout, self.backend.profile()).await {
            Ok(outcome) => outcome,
            Err(_) => RequestOutcome::TransportError("profile validation timed out".into()),
        };

        let _writes = self.handle.lock_writes().await;
        match outcome {
            RequestOutcome::Success(user) => {
                tracing::info!(user_id = user.id, "stored token confirmed");
                self.handle.replace_if_token(
                    &token,
                    Session::authenticated(token.clone(), user),
                    "stored token confirmed",
                );
            }
            failure => {
                tracing::info!(
                    reason = %failure.error_message().unwrap_or_default(),
                    "stored token rejected"
                );
                if self
                    .handle
                    .replace_if_token(&token, Session::guest(), "stored token rejected")
                {
                    self.handle.forget_token().await;
                }
            }
        }
        self.handle.mode()
    }

    /// Logs in with email and password.
    ///
    /// On success the token is persisted first, then the session becomes
    /// `Authenticated`. On any failure the session is left exactly as it
    /// was, including an existing authenticated session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, SessionError> {
        let credentials = Credentials::new(email, password);
        let outcome = self.backend.login(&credentials).await;
        self.establish(outcome, "login").await
    }

    /// Creates an account. Same contract as [`login`](Self::login).
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<UserProfile, SessionError> {
        let registration = Registration::new(email, password, name);
        let outcome = self.backend.register(&registration).await;
        self.establish(outcome, "register").await
    }

    /// Drops to `Guest` and forgets the stored token. Never fails: a store
    /// error is logged and the in-memory session is demoted regardless.
    pub async fn logout(&self) {
        self.handle.invalidate("logout").await;
    }

    async fn establish(
        &self,
        outcome: RequestOutcome<AuthResponse>,
        reason: &str,
    ) -> Result<UserProfile, SessionError> {
        let auth = SessionError::from_outcome(outcome).inspect_err(|e| {
            tracing::warn!(error = %e, reason, "authentication failed");
        })?;

        if auth.token.is_empty() {
            return Err(SessionError::Transport(
                "invalid response body: empty token".into(),
            ));
        }

        let _writes = self.handle.lock_writes().await;
        let key = &self.handle.config().token_key;
        if let Err(e) = self.handle.store().set(key, &auth.token).await {
            tracing::warn!(error = %e, reason, "failed to persist token");
            return Err(e.into());
        }

        tracing::info!(user_id = auth.user.id, reason, "authenticated");
        let user = auth.user.clone();
        self.handle
            .replace(Session::authenticated(auth.token, auth.user), reason);
        Ok(user)
    }
}

/// Resets a still-pending validation of `token` back to plain
/// `Unresolved` when dropped. A no-op once the validation has settled.
struct AbandonOnDrop<'a, S> {
    handle: &'a SessionHandle<S>,
    token: &'a str,
}

impl<S> Drop for AbandonOnDrop<'_, S> {
    fn drop(&mut self) {
        self.handle.abandon_validation(self.token);
    }
}

// =========================================================================
// Tests
// =========================================================================
