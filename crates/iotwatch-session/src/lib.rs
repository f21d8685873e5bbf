//! Session management for IoTWatch.
//!
//! This crate is the single authority on whether the client is a guest
//! or an authenticated user:
//!
//! 1. **State**: the current [`Session`], shared through a [`SessionHandle`]
//!    that anyone can read and subscribe to
//! 2. **Persistence**: the bearer token in a [`CredentialStore`]
//! 3. **Transitions**: startup validation, login, registration and
//!    logout, all driven by the [`SessionManager`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade / UI (above)  ← reads Session, calls login / logout / check_auth
//!     ↕
//! Session Layer (this crate)  ← owns Session and the stored token
//!     ↕
//! API Layer (beside)  ← implements AuthBackend, invalidates on 401
//! ```

mod auth;
mod error;
mod handle;
mod manager;
mod session;
mod store;

pub use auth::AuthBackend;
pub use error::{SessionError, StoreError};
pub use handle::SessionHandle;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionMode};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
