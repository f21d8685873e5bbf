//! MQTT broker implementation using `rumqttc`.
//!
//! Each [`MqttBroker::connect`] builds a fresh `rumqttc` client, drives its
//! event loop until the broker acknowledges the connection, then hands the
//! event loop to a pump task that forwards publishes onto the caller's
//! channel and answers pending subscriptions as their SUBACKs arrive.
//! The pump stops at the first connection error instead of letting
//! `rumqttc` reconnect on its own: retry policy belongs to the caller.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubAck, SubscribeReasonCode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{Broker, BrokerEvent, BrokerLink, LinkId, TransportError};

/// Request queue depth between `AsyncClient` and its event loop.
const CLIENT_CAPACITY: usize = 16;

/// Client id used when none is configured. A random suffix is appended
/// so two clients never evict each other from the broker.
pub const DEFAULT_CLIENT_ID: &str = "iotwatch";

/// How long `disconnect` waits for the DISCONNECT packet to be written.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Subscriptions waiting for their SUBACK, oldest first. MQTT answers
/// SUBSCRIBEs in order on one connection.
type PendingAcks = Arc<Mutex<VecDeque<oneshot::Sender<Result<(), TransportError>>>>>;

/// Where and how to reach the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// How long to wait for the broker's CONNACK.
    pub connect_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
            connect_timeout_ms: 10_000,
        }
    }
}

impl MqttConfig {
    /// Replaces a default or empty client id with a unique one.
    fn with_unique_client_id(mut self) -> Self {
        let id = self.client_id.trim();
        if id.is_empty() || id == DEFAULT_CLIENT_ID {
            let suffix: u32 = rand::rng().random();
            self.client_id = format!("{DEFAULT_CLIENT_ID}-{suffix:08x}");
        }
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)));
        if let Some(username) = &self.username {
            options.set_credentials(
                username.clone(),
                self.password.clone().unwrap_or_default(),
            );
        }
        options
    }
}

/// A [`Broker`] backed by an MQTT server.
#[derive(Debug, Clone)]
pub struct MqttBroker {
    config: MqttConfig,
}

impl MqttBroker {
    /// Creates a broker for the given configuration. Nothing connects yet.
    ///
    /// A default client id is made unique here, once, so every reconnect
    /// of this broker presents the same id.
    pub fn new(config: MqttConfig) -> Result<Self, TransportError> {
        if config.host.trim().is_empty() {
            return Err(TransportError::InvalidAddress("empty MQTT host".into()));
        }
        Ok(Self {
            config: config.with_unique_client_id(),
        })
    }

    /// Returns the broker configuration.
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }
}

impl Broker for MqttBroker {
    type Link = MqttLink;

    fn connect(
        &self,
        events: mpsc::Sender<BrokerEvent>,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send {
        async move {
            let (client, mut eventloop) =
                AsyncClient::new(self.config.options(), CLIENT_CAPACITY);
            let deadline = Duration::from_millis(self.config.connect_timeout_ms);

            tokio::time::timeout(deadline, await_connack(&mut eventloop))
                .await
                .map_err(|_| TransportError::Timeout)??;

            let id = LinkId::next();
            tracing::info!(
                %id,
                host = %self.config.host,
                port = self.config.port,
                client_id = %self.config.client_id,
                "MQTT link established"
            );

            let acks = PendingAcks::default();
            let pump = tokio::spawn(pump_events(id, eventloop, events, Arc::clone(&acks)));
            Ok(MqttLink {
                id,
                client,
                pump,
                acks,
                ack_timeout: deadline,
            })
        }
    }
}

/// Polls the event loop until the broker answers the CONNECT.
async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(TransportError::ConnectFailed(format!(
                        "broker refused connection: {:?}",
                        ack.code
                    )))
                };
            }
            Ok(_) => continue,
            Err(e) => return Err(TransportError::ConnectFailed(e.to_string())),
        }
    }
}

/// Maps a SUBACK to the outcome of the subscription it answers.
fn suback_result(ack: &SubAck) -> Result<(), TransportError> {
    if ack
        .return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(TransportError::SubscribeFailed(format!(
            "broker refused subscription (pkid {})",
            ack.pkid
        )));
    }
    Ok(())
}

/// Forwards publishes and answers pending subscriptions until the link
/// fails, the link is disconnected, or the receiver goes away.
async fn pump_events(
    id: LinkId,
    mut eventloop: EventLoop,
    events: mpsc::Sender<BrokerEvent>,
    acks: PendingAcks,
) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => BrokerEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            },
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                let waiter = acks.lock().ok().and_then(|mut pending| pending.pop_front());
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(suback_result(&ack));
                    }
                    None => tracing::debug!(%id, pkid = ack.pkid, "unexpected SUBACK"),
                }
                continue;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!(%id, "DISCONNECT sent, pump finished");
                break;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => BrokerEvent::LinkLost {
                reason: "broker sent DISCONNECT".into(),
            },
            Ok(_) => continue,
            Err(e) => BrokerEvent::LinkLost {
                reason: e.to_string(),
            },
        };

        let lost = matches!(event, BrokerEvent::LinkLost { .. });
        if events.send(event).await.is_err() {
            tracing::debug!(%id, "event receiver dropped, stopping pump");
            break;
        }
        if lost {
            tracing::debug!(%id, "MQTT link lost, pump finished");
            break;
        }
    }

    // Whoever still waits for a SUBACK gets a closed channel.
    if let Ok(mut pending) = acks.lock() {
        pending.clear();
    }
}

/// One established MQTT connection.
pub struct MqttLink {
    id: LinkId,
    client: AsyncClient,
    pump: JoinHandle<()>,
    acks: PendingAcks,
    ack_timeout: Duration,
}

impl BrokerLink for MqttLink {
    fn subscribe(
        &mut self,
        topic: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let topic = topic.to_string();
        async move {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.acks
                .lock()
                .map_err(|_| TransportError::SubscribeFailed("link state poisoned".into()))?
                .push_back(ack_tx);

            self.client
                .subscribe(topic.as_str(), QoS::AtMostOnce)
                .await
                .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;

            match tokio::time::timeout(self.ack_timeout, ack_rx).await {
                Ok(Ok(result)) => result?,
                Ok(Err(_)) => {
                    return Err(TransportError::SubscribeFailed(
                        "link closed before SUBACK".into(),
                    ));
                }
                Err(_) => return Err(TransportError::Timeout),
            }
            tracing::debug!(id = %self.id, %topic, "subscribed");
            Ok(())
        }
    }

    /// Sends DISCONNECT and waits briefly for it to reach the wire before
    /// the event loop is dropped.
    fn disconnect(
        &mut self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            let result = self
                .client
                .disconnect()
                .await
                .map_err(|e| TransportError::LinkClosed(e.to_string()));
            if result.is_ok()
                && tokio::time::timeout(DISCONNECT_GRACE, &mut self.pump)
                    .await
                    .is_err()
            {
                tracing::debug!(id = %self.id, "DISCONNECT not flushed in time");
            }
            self.pump.abort();
            tracing::debug!(id = %self.id, "MQTT link closed");
            result
        }
    }

    fn id(&self) -> LinkId {
        self.id
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    // -- Scripted broker --------------------------------------------------

    const CONNECT: u8 = 1;
    const SUBSCRIBE: u8 = 8;
    const DISCONNECT: u8 = 14;

    /// Reads one MQTT packet, returning its type and variable part.
    async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        let header = stream.read_u8().await.ok()?;
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.ok()?;
            len |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.ok()?;
        Some((header >> 4, body))
    }

    /// Accepts one client, acknowledges its CONNECT, answers its first
    /// SUBSCRIBE with `suback_code`, then reports the type of every
    /// later packet until the socket closes.
    async fn scripted_broker(suback_code: u8) -> (MqttBroker, mpsc::UnboundedReceiver<u8>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (kind, _) = read_packet(&mut stream).await.unwrap();
            assert_eq!(kind, CONNECT);
            stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

            let (kind, body) = read_packet(&mut stream).await.unwrap();
            assert_eq!(kind, SUBSCRIBE);
            stream
                .write_all(&[0x90, 0x03, body[0], body[1], suback_code])
                .await
                .unwrap();

            while let Some((kind, _)) = read_packet(&mut stream).await {
                let _ = seen_tx.send(kind);
            }
        });

        let broker = MqttBroker::new(MqttConfig {
            host: "127.0.0.1".into(),
            port,
            connect_timeout_ms: 2_000,
            ..MqttConfig::default()
        })
        .unwrap();
        (broker, seen_rx)
    }

    #[tokio::test]
    async fn test_subscribe_granted_then_disconnect_reaches_broker() {
        let (broker, mut seen) = scripted_broker(0x00).await;
        let (tx, _rx) = mpsc::channel(4);

        let mut link = broker.connect(tx).await.unwrap();
        link.subscribe("sensors/temperature").await.unwrap();
        link.disconnect().await.unwrap();

        let kind = tokio::time::timeout(Duration::from_secs(2), seen.recv())
            .await
            .unwrap();
        assert_eq!(kind, Some(DISCONNECT));
    }

    #[tokio::test]
    async fn test_subscribe_refused_by_suback_fails() {
        let (broker, _seen) = scripted_broker(0x80).await;
        let (tx, _rx) = mpsc::channel(4);

        let mut link = broker.connect(tx).await.unwrap();
        let result = link.subscribe("sensors/temperature").await;

        assert!(matches!(result, Err(TransportError::SubscribeFailed(_))));
    }

    #[test]
    fn test_suback_result_maps_failure_code() {
        let granted = SubAck {
            pkid: 1,
            return_codes: vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
        };
        let refused = SubAck {
            pkid: 2,
            return_codes: vec![SubscribeReasonCode::Failure],
        };
        assert!(suback_result(&granted).is_ok());
        assert!(matches!(
            suback_result(&refused),
            Err(TransportError::SubscribeFailed(_))
        ));
    }

    #[test]
    fn test_new_default_client_id_gets_unique_suffix() {
        let a = MqttBroker::new(MqttConfig::default()).unwrap();
        let b = MqttBroker::new(MqttConfig::default()).unwrap();

        assert!(a.config().client_id.starts_with("iotwatch-"));
        assert_ne!(a.config().client_id, b.config().client_id);
    }

    #[test]
    fn test_new_explicit_client_id_is_kept() {
        let broker = MqttBroker::new(MqttConfig {
            client_id: "lab-panel-3".into(),
            ..MqttConfig::default()
        })
        .unwrap();
        assert_eq!(broker.config().client_id, "lab-panel-3");
    }

    #[test]
    fn test_default_config_targets_local_broker() {
        let config = MqttConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1883);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_new_rejects_empty_host() {
        let result = MqttBroker::new(MqttConfig {
            host: "  ".into(),
            ..MqttConfig::default()
        });
        assert!(matches!(result, Err(TransportError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_connect_unreachable_broker_fails() {
        let broker = MqttBroker::new(MqttConfig {
            host: "127.0.0.1".into(),
            port: 9,
            connect_timeout_ms: 2_000,
            ..MqttConfig::default()
        })
        .expect("valid config");
        let (tx, _rx) = mpsc::channel(4);

        let result = broker.connect(tx).await;

        assert!(matches!(
            result,
            Err(TransportError::ConnectFailed(_) | TransportError::Timeout)
        ));
    }
}
