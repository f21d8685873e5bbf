//! The backend the session layer authenticates against.
//!
//! The session crate doesn't speak HTTP. It defines the [`AuthBackend`]
//! trait: three async calls that return a [`RequestOutcome`]. The API
//! crate implements it on top of the request pipeline, and tests
//! implement it with a mock.
//!
//! Keeping the trait here breaks what would otherwise be a cycle: the
//! pipeline needs the session (to read the token and to invalidate on a
//! 401) and the session needs the pipeline (to log in).

use std::future::Future;

use iotwatch_protocol::{AuthResponse, Credentials, Registration, RequestOutcome, UserProfile};

/// Login, registration, and profile lookup.
///
/// # Trait bounds
///
/// - `Send + Sync` → the backend is shared between the session manager
///   and whatever else issues API calls.
/// - `'static` → it lives as long as the client.
///
/// Implementations must send `login` and `register` without a bearer
/// token, and `profile` with the session's current token.
pub trait AuthBackend: Send + Sync + 'static {
    /// `POST /api/auth/login`.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = RequestOutcome<AuthResponse>> + Send;

    /// `POST /api/auth/register`.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = RequestOutcome<AuthResponse>> + Send;

    /// `GET /api/auth/profile` for the token currently in the session.
    fn profile(&self) -> impl Future<Output = RequestOutcome<UserProfile>> + Send;
}
