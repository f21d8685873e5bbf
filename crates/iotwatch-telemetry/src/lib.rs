//! Realtime telemetry for IoTWatch.
//!
//! A [`TelemetryClient`] keeps one live subscription to the sensor broker
//! and exposes the latest decoded [`SensorReading`], the link's
//! [`ConnectionState`] and the last [`TelemetryFault`] as a single
//! [`TelemetrySnapshot`].
//!
//! # Integration
//!
//! ```ignore
//! let client = TelemetryClient::spawn(broker, TelemetryConfig::default());
//! client.start().await?;
//!
//! let mut changes = client.subscribe();
//! while changes.changed().await.is_ok() {
//!     let snapshot = changes.borrow_and_update().clone();
//!     render(snapshot.state, snapshot.reading);
//! }
//! ```
//!
//! Link loss moves to `Reconnecting` and retries with capped exponential
//! backoff ([`BackoffPolicy`]). When the retry budget is spent the client
//! parks in `Failed` until [`TelemetryClient::reconnect`] is called.
//!
//! [`SensorReading`]: iotwatch_protocol::SensorReading

mod client;
mod config;
mod error;
mod state;

pub use client::TelemetryClient;
pub use config::{BackoffPolicy, TelemetryConfig};
pub use error::TelemetryError;
pub use state::{ConnectionState, FaultKind, TelemetryFault, TelemetrySnapshot};
