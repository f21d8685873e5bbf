//! `IotWatch` builder and the wired-up client.
//!
//! This is the entry point for applications. It ties the layers together:
//! transport → api → session, and transport → telemetry.

use std::sync::Arc;

use iotwatch_api::{Api, RequestPipeline};
use iotwatch_session::{
    CredentialStore, FileCredentialStore, Session, SessionHandle, SessionManager,
};
use iotwatch_telemetry::TelemetryClient;
use iotwatch_transport::{Broker, HttpTransport, MqttBroker, ReqwestTransport};
use tokio::sync::watch;

use crate::{ClientConfig, IotWatchError};

/// Builder for an [`IotWatch`] client.
///
/// # Example
///
/// ```rust,ignore
/// use iotwatch::prelude::*;
///
/// let watch = IotWatch::builder()
///     .config(config)
///     .build_with(http, broker, store);
/// watch.session().check_auth().await;
/// ```
pub struct IotWatchBuilder {
    config: ClientConfig,
}

impl IotWatchBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires the client over caller-supplied collaborators.
    ///
    /// Spawns the telemetry task, so this must run inside a Tokio runtime.
    /// Telemetry stays idle until [`TelemetryClient::start`] is called.
    pub fn build_with<H, S, B>(self, http: H, broker: B, store: S) -> IotWatch<H, S>
    where
        H: HttpTransport,
        S: CredentialStore,
        B: Broker,
    {
        let config = self.config.validated();

        let handle = SessionHandle::new(store, config.session.clone());
        let api = Api::new(RequestPipeline::new(Arc::new(http), handle.clone()));
        let session = SessionManager::new(handle, Arc::new(api.clone()));
        let telemetry = TelemetryClient::spawn(broker, config.telemetry.clone());

        tracing::info!(
            base_url = %config.api.base_url,
            topic = %config.telemetry.topic,
            "IoTWatch client ready"
        );
        IotWatch {
            config,
            api,
            session,
            telemetry,
        }
    }

    /// Wires the client over the real HTTP backend, MQTT broker and
    /// on-disk credential store described by the configuration.
    pub fn connect(
        self,
    ) -> Result<IotWatch<ReqwestTransport, FileCredentialStore>, IotWatchError> {
        let config = self.config.validated();

        let http =
            ReqwestTransport::new(&config.api.base_url, config.api.request_timeout())?;
        let broker = MqttBroker::new(config.broker.connection.clone())?;
        let path = config
            .credentials_path()
            .ok_or(IotWatchError::NoCredentialsPath)?;
        tracing::debug!(path = %path.display(), "using file credential store");
        let store = FileCredentialStore::new(path);

        Ok(Self { config }.build_with(http, broker, store))
    }
}

impl Default for IotWatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A wired IoTWatch client: one session, one API, one telemetry link.
///
/// The session manager and the API share the same session state, so a
/// 401 from any endpoint is immediately visible through
/// [`session()`](Self::session).
pub struct IotWatch<H, S> {
    config: ClientConfig,
    api: Api<H, S>,
    session: SessionManager<Api<H, S>, S>,
    telemetry: TelemetryClient,
}

impl IotWatch<ReqwestTransport, FileCredentialStore> {
    pub fn builder() -> IotWatchBuilder {
        IotWatchBuilder::new()
    }

    /// Shorthand for `IotWatch::builder().config(config).connect()`.
    pub fn connect(config: ClientConfig) -> Result<Self, IotWatchError> {
        IotWatchBuilder::new().config(config).connect()
    }
}

impl<H: HttpTransport, S: CredentialStore> IotWatch<H, S> {
    /// The validated configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Login, registration, logout and the startup check.
    pub fn session(&self) -> &SessionManager<Api<H, S>, S> {
        &self.session
    }

    pub fn api(&self) -> &Api<H, S> {
        &self.api
    }

    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Stops telemetry and ends its task. The session is left as is so a
    /// stored token survives for the next start.
    pub async fn shutdown(&self) -> Result<(), IotWatchError> {
        self.telemetry.shutdown().await?;
        tracing::info!("IoTWatch client shut down");
        Ok(())
    }
}
