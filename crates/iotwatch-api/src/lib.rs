//! Authenticated REST access for IoTWatch.
//!
//! Every backend call flows through one [`RequestPipeline`]:
//!
//! 1. **Token injection**: the session's current token becomes an
//!    `Authorization: Bearer` header (unless the request is anonymous)
//! 2. **Status mapping**: every response becomes a [`RequestOutcome`]
//! 3. **Unauthorized handling**: a 401 on a bearer request demotes the
//!    session to guest before the caller sees the outcome
//!
//! [`Api`] layers the typed endpoints on top and implements
//! [`AuthBackend`](iotwatch_session::AuthBackend) so the session manager
//! can log in through it.
//!
//! [`RequestOutcome`]: iotwatch_protocol::RequestOutcome

mod endpoints;
mod pipeline;
mod request;

pub use endpoints::{Api, DEFAULT_PAGE_LIMIT};
pub use iotwatch_transport::Method;
pub use pipeline::RequestPipeline;
pub use request::{ApiConfig, ApiRequest, AuthMode};
