//! Telemetry actor: an isolated Tokio task that owns the broker link.
//!
//! The task multiplexes four inputs in one `tokio::select!` loop:
//!
//! ```text
//! loop {
//!     select! {
//!         command from a handle      → start / stop / reconnect / shutdown
//!         event from the live link   → decode reading, or link lost
//!         connect attempt finished   → Connected, or count a failure
//!         backoff timer fired        → launch the next attempt
//!     }
//! }
//! ```
//!
//! At most one connect attempt and one backoff timer exist at a time, and
//! both live in the actor's own fields, so `stop()` cancels them
//! deterministically.

use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use iotwatch_protocol::SensorReading;
use iotwatch_transport::{Broker, BrokerEvent, BrokerLink, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;

use crate::{
    ConnectionState, FaultKind, TelemetryConfig, TelemetryError, TelemetryFault,
    TelemetrySnapshot,
};

/// Capacity of the handle → actor command channel.
const COMMAND_BUFFER: usize = 16;

/// Commands sent to the telemetry actor through its channel.
///
/// Every variant carries a reply channel; the actor answers with the
/// connection state after handling the command.
enum TelemetryCommand {
    Start {
        reply: oneshot::Sender<ConnectionState>,
    },
    Stop {
        reply: oneshot::Sender<ConnectionState>,
    },
    Reconnect {
        reply: oneshot::Sender<ConnectionState>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running telemetry actor.
///
/// Cheap to clone: a command sender plus a snapshot receiver. Snapshots
/// are readable synchronously ([`snapshot`](Self::snapshot)) and as a
/// change stream ([`subscribe`](Self::subscribe)).
#[derive(Clone)]
pub struct TelemetryClient {
    commands: mpsc::Sender<TelemetryCommand>,
    snapshot: watch::Receiver<TelemetrySnapshot>,
}

impl TelemetryClient {
    /// Spawns the actor task. The client starts `Idle`; nothing touches
    /// the network until [`start`](Self::start).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<B: Broker>(broker: B, config: TelemetryConfig) -> Self {
        let config = config.validated();
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (state, snapshot) = watch::channel(TelemetrySnapshot::default());

        let actor = TelemetryActor {
            broker: Arc::new(broker),
            config,
            state,
            receiver,
            link: None,
            events: None,
            attempt: None,
            retry: None,
            retries: 0,
            failures: 0,
        };
        tokio::spawn(actor.run());

        Self { commands, snapshot }
    }

    /// Begins connecting. A no-op while `Connecting`, `Connected` or
    /// `Reconnecting`; from `Idle` or `Failed` it moves to `Connecting`.
    pub async fn start(&self) -> Result<ConnectionState, TelemetryError> {
        self.request(|reply| TelemetryCommand::Start { reply }).await
    }

    /// Tears the link down, cancels any pending attempt or backoff timer,
    /// and moves to `Idle`. Safe from any state.
    pub async fn stop(&self) -> Result<ConnectionState, TelemetryError> {
        self.request(|reply| TelemetryCommand::Stop { reply }).await
    }

    /// Manual reconnect: from `Failed` or `Idle`, behaves like
    /// [`start`](Self::start). Otherwise a no-op.
    pub async fn reconnect(&self) -> Result<ConnectionState, TelemetryError> {
        self.request(|reply| TelemetryCommand::Reconnect { reply })
            .await
    }

    /// Stops the link and ends the actor task. Later calls on any clone of
    /// this handle return [`TelemetryError::ClientClosed`].
    pub async fn shutdown(&self) -> Result<(), TelemetryError> {
        self.request(|reply| TelemetryCommand::Shutdown { reply })
            .await
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    /// A receiver that yields every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshot.clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TelemetryCommand,
    ) -> Result<T, TelemetryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| TelemetryError::ClientClosed)?;
        reply_rx.await.map_err(|_| TelemetryError::ClientClosed)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

type Connected<L> = (L, mpsc::Receiver<BrokerEvent>);

/// The internal actor state. Runs inside a Tokio task.
struct TelemetryActor<B: Broker> {
    broker: Arc<B>,
    config: TelemetryConfig,
    state: watch::Sender<TelemetrySnapshot>,
    receiver: mpsc::Receiver<TelemetryCommand>,
    link: Option<B::Link>,
    /// Events of `link`. Replaced on every connect, so a stale link can
    /// never feed the current one.
    events: Option<mpsc::Receiver<BrokerEvent>>,
    attempt: Option<JoinHandle<Result<Connected<B::Link>, TransportError>>>,
    retry: Option<Pin<Box<Sleep>>>,
    /// Backoff waits scheduled in the current episode.
    retries: u32,
    /// Failed attempts in the current episode.
    failures: u32,
}

impl<B: Broker> TelemetryActor<B> {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::debug!(topic = %self.config.topic, "telemetry actor started");

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(TelemetryCommand::Start { reply }) => {
                        self.start();
                        let _ = reply.send(self.connection_state());
                    }
                    Some(TelemetryCommand::Stop { reply }) => {
                        self.stop().await;
                        let _ = reply.send(self.connection_state());
                    }
                    Some(TelemetryCommand::Reconnect { reply }) => {
                        self.reconnect();
                        let _ = reply.send(self.connection_state());
                    }
                    Some(TelemetryCommand::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                event = next_event(&mut self.events) => match event {
                    Some(BrokerEvent::Message { topic, payload }) => {
                        self.handle_message(&topic, &payload);
                    }
                    Some(BrokerEvent::LinkLost { reason }) => self.link_lost(reason),
                    None => self.link_lost("event stream closed".to_string()),
                },
                result = attempt_finished(&mut self.attempt) => {
                    self.attempt = None;
                    self.handle_attempt(result);
                }
                () = retry_due(&mut self.retry) => {
                    self.retry = None;
                    self.launch_attempt();
                }
            }
        }

        tracing::debug!("telemetry actor stopped");
    }

    fn connection_state(&self) -> ConnectionState {
        self.state.borrow().state
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.connection_state();
        if previous != next {
            self.state.send_modify(|snapshot| snapshot.state = next);
            tracing::info!(from = %previous, to = %next, "telemetry state changed");
        }
    }

    fn set_fault(&self, fault: TelemetryFault) {
        self.state.send_modify(|snapshot| snapshot.fault = Some(fault));
    }

    fn start(&mut self) {
        let state = self.connection_state();
        if state.is_active() {
            tracing::debug!(%state, "start ignored, already active");
            return;
        }
        self.retries = 0;
        self.failures = 0;
        self.set_state(ConnectionState::Connecting);
        self.launch_attempt();
    }

    fn reconnect(&mut self) {
        match self.connection_state() {
            ConnectionState::Failed | ConnectionState::Idle => {
                tracing::info!("manual reconnect requested");
                self.start();
            }
            state => tracing::debug!(%state, "reconnect ignored"),
        }
    }

    async fn stop(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        self.retry = None;
        self.events = None;
        if let Some(mut link) = self.link.take() {
            let id = link.id();
            if let Err(e) = link.disconnect().await {
                tracing::warn!(link = %id, error = %e, "disconnect failed");
            }
        }
        self.retries = 0;
        self.failures = 0;
        self.set_state(ConnectionState::Idle);
    }

    /// Spawns a connect + subscribe attempt. Never runs two at once.
    fn launch_attempt(&mut self) {
        if self.attempt.is_some() {
            tracing::debug!("connect attempt already in flight");
            return;
        }

        let broker = Arc::clone(&self.broker);
        let topic = self.config.topic.clone();
        let buffer = self.config.event_buffer;
        tracing::debug!(%topic, failures = self.failures, "connecting to broker");

        self.attempt = Some(tokio::spawn(async move {
            let (events_tx, events_rx) = mpsc::channel(buffer);
            let mut link = broker.connect(events_tx).await?;
            if let Err(e) = link.subscribe(&topic).await {
                let _ = link.disconnect().await;
                return Err(e);
            }
            Ok((link, events_rx))
        }));
    }

    fn handle_attempt(
        &mut self,
        result: Result<Result<Connected<B::Link>, TransportError>, JoinError>,
    ) {
        match result {
            Ok(Ok((link, events))) => {
                tracing::info!(link = %link.id(), topic = %self.config.topic, "subscribed");
                self.link = Some(link);
                self.events = Some(events);
                self.retries = 0;
                self.failures = 0;
                self.state.send_if_modified(|snapshot| snapshot.clear_fault(FaultKind::Link));
                self.set_state(ConnectionState::Connected);
            }
            Ok(Err(e)) => self.attempt_failed(e.to_string()),
            Err(e) => self.attempt_failed(format!("connect task failed: {e}")),
        }
    }

    fn attempt_failed(&mut self, reason: String) {
        self.failures += 1;
        let max = self.config.backoff.max_attempts;
        self.set_fault(TelemetryFault::link(reason.clone()));

        if self.failures >= max {
            tracing::warn!(attempts = self.failures, %reason, "retry budget spent, giving up");
            self.set_state(ConnectionState::Failed);
            return;
        }
        tracing::warn!(attempt = self.failures, max, %reason, "connect attempt failed");
        self.arm_retry();
    }

    /// Schedules the next attempt, replacing any pending timer.
    fn arm_retry(&mut self) {
        let delay = self.config.backoff.delay(self.retries);
        self.retries += 1;
        tracing::debug!(delay_ms = delay.as_millis() as u64, retry = self.retries, "reconnect scheduled");
        self.retry = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn link_lost(&mut self, reason: String) {
        self.events = None;
        if let Some(link) = self.link.take() {
            tracing::warn!(link = %link.id(), %reason, "broker link lost");
        }
        self.retries = 0;
        self.failures = 0;
        self.set_fault(TelemetryFault::link(reason));
        self.set_state(ConnectionState::Reconnecting);
        self.arm_retry();
    }

    fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        match SensorReading::decode(payload, Utc::now()) {
            Ok(reading) => {
                tracing::trace!(%topic, temperature = reading.temperature, "reading received");
                self.state.send_modify(|snapshot| {
                    snapshot.reading = Some(reading);
                    snapshot.clear_fault(FaultKind::Decode);
                });
            }
            Err(e) => {
                tracing::debug!(%topic, error = %e, "dropping undecodable payload");
                self.set_fault(TelemetryFault::decode(e.to_string()));
            }
        }
    }
}

/// Next event from the live link; pends forever when there is none.
async fn next_event(events: &mut Option<mpsc::Receiver<BrokerEvent>>) -> Option<BrokerEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Result of the in-flight attempt; pends forever when there is none.
async fn attempt_finished<T>(attempt: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match attempt {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Completes when the backoff timer fires; pends forever when unarmed.
async fn retry_due(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
