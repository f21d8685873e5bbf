//! Wire protocol for IoTWatch.
//!
//! This crate defines the data that crosses the network:
//!
//! - **REST payloads** ([`UserProfile`], [`AuthResponse`], [`Page`], …)
//! - **Telemetry** ([`SensorReading`]) and its payload decoding
//! - **Outcomes** ([`RequestOutcome`]): the tagged result of an API call
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bodies to/from text
//! - **Errors** ([`ProtocolError`])
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes, status) → Protocol (typed payloads) → Session / Telemetry
//! ```

mod codec;
mod error;
mod outcome;
mod reading;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use outcome::{RequestOutcome, UNAUTHORIZED_MESSAGE};
pub use reading::SensorReading;
pub use types::{
    AuthResponse, Credentials, NewThreshold, Page, ReadingRecord, Registration,
    Threshold, UserProfile,
};
