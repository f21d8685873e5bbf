//! A cloneable view of the current session.
//!
//! [`SessionHandle`] is what the rest of the client holds: the request
//! pipeline reads the token from it and calls [`SessionHandle::invalidate`]
//! on a 401, the UI subscribes to it for mode changes. Only the
//! [`SessionManager`](crate::SessionManager) and `invalidate` ever write.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, watch};

use crate::{CredentialStore, Session, SessionConfig, SessionMode};

struct Inner<S> {
    state: watch::Sender<Session>,
    store: S,
    config: SessionConfig,
    /// Held across every "store write + state change" pair. Never held
    /// across a network call.
    writes: Mutex<()>,
}

/// Shared, observable session state plus the store that backs it.
pub struct SessionHandle<S> {
    inner: Arc<Inner<S>>,
}

// Manual impl: `#[derive(Clone)]` would require `S: Clone`.
impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CredentialStore> SessionHandle<S> {
    /// Creates a handle in the `Unresolved` state.
    pub fn new(store: S, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(Session::unresolved());
        Self {
            inner: Arc::new(Inner {
                state,
                store,
                config,
                writes: Mutex::new(()),
            }),
        }
    }

    /// A snapshot of the session as it is right now.
    pub fn current(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.state.borrow().mode()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.state.borrow().token().map(str::to_string)
    }

    pub fn user(&self) -> Option<iotwatch_protocol::UserProfile> {
        self.inner.state.borrow().user().cloned()
    }

    /// A receiver that yields every session change. The current value is
    /// marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Drops back to guest and forgets the stored token.
    ///
    /// The in-memory session is demoted before the store is touched, so
    /// no request started after this call can pick up the old token. A
    /// failed delete is logged and otherwise ignored.
    pub async fn invalidate(&self, reason: &str) {
        let _writes = self.lock_writes().await;
        self.replace(Session::guest(), reason);
        self.forget_token().await;
    }

    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.inner.writes.lock().await
    }

    /// Deletes the stored token, logging instead of failing.
    pub(crate) async fn forget_token(&self) {
        if let Err(e) = self.inner.store.delete(&self.inner.config.token_key).await {
            tracing::warn!(error = %e, "failed to delete stored token");
        }
    }

    /// Unconditionally publishes `next`.
    pub(crate) fn replace(&self, next: Session, reason: &str) {
        let previous = self.inner.state.send_replace(next);
        let mode = self.mode();
        if previous.mode() != mode {
            tracing::info!(from = %previous.mode(), to = %mode, reason, "session mode changed");
        }
    }

    /// Publishes `next` only while the session is still validating
    /// `token`.
    ///
    /// Returns `false` when something else (a logout, a 401, a fresh
    /// login, another caller's validation) replaced the session in the
    /// meantime; the stale result is then discarded.
    pub(crate) fn replace_if_token(&self, token: &str, next: Session, reason: &str) -> bool {
        let mut from = None;
        let applied = self.inner.state.send_if_modified(|current| {
            if !current.is_validating(token) {
                return false;
            }
            from = Some(current.mode());
            *current = next;
            true
        });

        if applied {
            let to = self.mode();
            if let Some(from) = from.filter(|from| *from != to) {
                tracing::info!(%from, %to, reason, "session mode changed");
            }
        } else {
            tracing::debug!(reason, "session changed during validation, result discarded");
        }
        applied
    }
}

impl<S> SessionHandle<S> {
    /// Drops a pending validation of `token` back to plain `Unresolved`,
    /// waking anyone waiting on it. Does nothing once it has settled.
    pub(crate) fn abandon_validation(&self, token: &str) {
        let abandoned = self.inner.state.send_if_modified(|current| {
            if !current.is_validating(token) {
                return false;
            }
            *current = Session::unresolved();
            true
        });
        if abandoned {
            tracing::debug!("token validation abandoned");
        }
    }
}
