//! # IoTWatch
//!
//! Client runtime for an IoT temperature monitor.
//!
//! IoTWatch keeps a live subscription to the sensor broker and an
//! authenticated session against the REST backend. Applications build one
//! [`IotWatch`] and read everything through it:
//!
//! - [`IotWatch::session`]: startup check, login, registration, logout
//! - [`IotWatch::api`]: readings history and thresholds
//! - [`IotWatch::telemetry`]: latest reading and connection state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iotwatch::prelude::*;
//!
//! # async fn run() -> Result<(), IotWatchError> {
//! iotwatch::init_tracing();
//! let config = ClientConfig::load("iotwatch.toml").await?;
//! let watch = IotWatch::connect(config)?;
//!
//! watch.session().check_auth().await;
//! watch.telemetry().start().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::{IotWatch, IotWatchBuilder};
pub use config::{BrokerConfig, ClientConfig};
pub use error::IotWatchError;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that honours `RUST_LOG` (default
/// `info`). Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Common imports for IoTWatch applications.
pub mod prelude {
    pub use crate::{BrokerConfig, ClientConfig, IotWatch, IotWatchBuilder, IotWatchError};
    pub use iotwatch_api::{Api, ApiConfig, ApiRequest, AuthMode, DEFAULT_PAGE_LIMIT};
    pub use iotwatch_protocol::{
        NewThreshold, Page, ReadingRecord, RequestOutcome, SensorReading, Threshold,
        UserProfile,
    };
    pub use iotwatch_session::{
        CredentialStore, FileCredentialStore, MemoryCredentialStore, Session, SessionConfig,
        SessionError, SessionMode,
    };
    pub use iotwatch_telemetry::{
        BackoffPolicy, ConnectionState, TelemetryClient, TelemetryConfig, TelemetryFault,
        TelemetrySnapshot,
    };
    pub use iotwatch_transport::{
        Broker, BrokerEvent, BrokerLink, HttpRequest, HttpResponse, HttpTransport, LinkId,
        Method, MqttConfig,
    };
}
