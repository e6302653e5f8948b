// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol Connection (§4.2): a thin wrapper around the injected
//! `rumqttc` wire codec, exposing the state machine and FIFO ack
//! correlation the rest of the crate depends on.
//!
//! Grounded on the teacher's `protocol::broker_pool::{SharedConnection,
//! handle_pooled_mqtt_events}`: one `AsyncClient` + one spawned pump task
//! draining `EventLoop::poll()`. The teacher correlates inbound frames by
//! device topic prefix; this module instead correlates *acks* by FIFO
//! order, which is sufficient because `rumqttc` and the broker both
//! guarantee per-connection FIFO delivery (§5 "Ordering guarantees").

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::{Mutex as AsyncMutex, RwLock, mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, ProtocolError, Result, TimeoutError};
use crate::event::{DisconnectType, EventBus, MqttEvent, OnDisconnectEvent, Properties};
use crate::metrics::Metrics;

/// Lifecycle states of a [`Connection`] (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed but `connect()` has not yet been called.
    New,
    /// CONNECT has been sent; awaiting CONNACK.
    Connecting,
    /// CONNACK accepted; idle.
    Connected,
    /// Holds at least one active subscription.
    Subscribed,
    /// A publish is in flight.
    Publishing,
    /// DISCONNECT has been sent; tearing down.
    Disconnecting,
    /// Terminal: no further operations are permitted.
    Closed,
}

impl ConnectionState {
    fn name(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Subscribed => "subscribed",
            Self::Publishing => "publishing",
            Self::Disconnecting => "disconnecting",
            Self::Closed => "closed",
        }
    }

    fn is_live(self) -> bool {
        !matches!(self, Self::New | Self::Closed)
    }
}

/// One inbound application message, as surfaced by [`Connection::receive`].
#[derive(Debug, Clone)]
pub struct IncomingFrame {
    /// MQTT packet type (currently always `"publish"`).
    pub frame_type: &'static str,
    /// Topic the frame arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// QoS the frame was delivered at.
    pub qos: u8,
    /// Duplicate-delivery flag.
    pub dup: bool,
    /// Retain flag.
    pub retain: bool,
    /// Broker-assigned packet identifier, for QoS 1/2 frames.
    pub message_id: Option<u16>,
    /// MQTT v5 user properties.
    pub properties: Properties,
}

/// Result of [`Connection::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// QoS 0: the byte write completed; no broker acknowledgement exists.
    Fired,
    /// QoS 1/2: the broker acknowledged the publish (PUBACK/PUBCOMP).
    Acked,
}

/// SUBACK reason codes, one per requested filter, in request order.
pub type SubAckCodes = Vec<u8>;

/// FIFO queues correlating outgoing requests with their eventual acks.
/// `parking_lot::Mutex` is used because these are only ever held across a
/// `push_back`/`pop_front`, never across an `.await`.
struct PendingAcks {
    publish: SyncMutex<VecDeque<oneshot::Sender<()>>>,
    subscribe: SyncMutex<VecDeque<oneshot::Sender<SubAckCodes>>>,
    unsubscribe: SyncMutex<VecDeque<oneshot::Sender<()>>>,
}

impl PendingAcks {
    fn new() -> Self {
        Self {
            publish: SyncMutex::new(VecDeque::new()),
            subscribe: SyncMutex::new(VecDeque::new()),
            unsubscribe: SyncMutex::new(VecDeque::new()),
        }
    }
}

/// A live MQTT session (§4.2, §3 "Connection").
pub struct Connection {
    pool_name: String,
    config: Arc<ClientConfig>,
    client: AsyncClient,
    state: Arc<RwLock<ConnectionState>>,
    pending: Arc<PendingAcks>,
    incoming_rx: AsyncMutex<mpsc::Receiver<IncomingFrame>>,
    last_activity: SyncMutex<Instant>,
}

impl Connection {
    /// Performs the CONNECT/CONNACK handshake and spawns the event-loop
    /// pump task. Fails with [`Error::Timeout`] if CONNACK does not arrive
    /// within `connect_timeout`, or with [`Error::Protocol`] if the broker
    /// rejects the connection.
    pub async fn connect(
        pool_name: impl Into<String>,
        config: Arc<ClientConfig>,
        connect_timeout: Duration,
        event_bus: Option<EventBus>,
        metrics: Metrics,
    ) -> Result<Self> {
        let pool_name = pool_name.into();
        metrics.connections.incr_attempt();

        let mut options = MqttOptions::new(config.client_id(), config.host(), config.port());
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive()).max(1)));
        options.set_clean_session(config.clean_session());
        if let (Some(username), Some(password)) = (config.username(), config.password()) {
            options.set_credentials(username, password);
        }
        if let Some(will) = config.will() {
            options.set_last_will(rumqttc::LastWill::new(
                &will.topic,
                will.payload.clone(),
                qos_from_u8(will.qos),
                will.retain,
            ));
        }

        let (client, mut event_loop) = AsyncClient::new(options, 64);
        let state = Arc::new(RwLock::new(ConnectionState::Connecting));
        let pending = Arc::new(PendingAcks::new());
        let (incoming_tx, incoming_rx) = mpsc::channel(256);
        let (connack_tx, connack_rx) = oneshot::channel();

        let pump_state = state.clone();
        let pump_pending = pending.clone();
        let pump_pool_name = pool_name.clone();
        let pump_client_id = config.client_id().to_string();
        let pump_metrics = metrics.clone();
        let mut connack_tx = Some(connack_tx);

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(packet)) => {
                        if let Some(tx) = connack_tx.take_if(|_| matches!(packet, Packet::ConnAck(_))) {
                            let _ = tx.send(packet_to_connack_result(&packet));
                        }
                        handle_incoming(
                            packet,
                            &incoming_tx,
                            &pump_pending,
                            &pump_state,
                            &event_bus,
                            &pump_pool_name,
                            &pump_client_id,
                            &pump_metrics,
                        )
                        .await;
                    }
                    Ok(Event::Outgoing(_)) => {}
                    Err(err) => {
                        warn!(pool = %pump_pool_name, client_id = %pump_client_id, error = %err, "event loop terminated");
                        *pump_state.write().await = ConnectionState::Closed;
                        if let Some(bus) = &event_bus {
                            bus.publish(MqttEvent::OnDisconnect(OnDisconnectEvent {
                                disconnect_type: DisconnectType::Error,
                                code: 0x80,
                                pool_name: pump_pool_name.clone(),
                                client_id: pump_client_id.clone(),
                                qos: None,
                            }));
                        }
                        pump_metrics.errors.record(
                            crate::metrics::ErrorCategory::Connect,
                            pump_client_id.clone(),
                            err.to_string(),
                        );
                        break;
                    }
                }
            }
        });

        match tokio::time::timeout(connect_timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => {
                metrics.connections.incr_success();
                *state.write().await = ConnectionState::Connected;
                debug!(pool = %pool_name, client_id = %config.client_id(), "connected");
            }
            Ok(Ok(Err(code))) => {
                return Err(Error::Protocol(ProtocolError::Rejected { phase: "connect", code }));
            }
            Ok(Err(_)) => {
                return Err(Error::Protocol(ProtocolError::ChannelClosed(
                    "event loop pump exited before CONNACK".to_string(),
                )));
            }
            Err(_) => {
                return Err(Error::Timeout(TimeoutError {
                    operation: "connect",
                    elapsed_ms: connect_timeout.as_millis() as u64,
                }));
            }
        }

        Ok(Self {
            pool_name,
            config,
            client,
            state,
            pending,
            incoming_rx: AsyncMutex::new(incoming_rx),
            last_activity: SyncMutex::new(Instant::now()),
        })
    }

    /// Name of the pool this connection belongs to.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// The connection's client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Seconds since the last successful operation.
    #[must_use]
    pub fn idle_seconds(&self) -> u64 {
        self.last_activity.lock().elapsed().as_secs()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    async fn require_live(&self) -> Result<()> {
        let state = *self.state.read().await;
        if state.is_live() {
            Ok(())
        } else {
            Err(Error::Protocol(ProtocolError::InvalidState {
                expected: "connected",
                actual: state.name(),
            }))
        }
    }

    /// Publishes `payload` to `topic`. QoS 0 returns as soon as the bytes
    /// are queued; QoS 1/2 waits for the broker's acknowledgement.
    pub async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: u8,
        retain: bool,
    ) -> Result<PublishOutcome> {
        self.require_live().await?;
        *self.state.write().await = ConnectionState::Publishing;

        if qos == 0 {
            self.client
                .publish(topic, QoS::AtMostOnce, retain, payload)
                .await
                .map_err(ProtocolError::Mqtt)?;
            self.touch();
            return Ok(PublishOutcome::Fired);
        }

        let (tx, rx) = oneshot::channel();
        self.pending.publish.lock().push_back(tx);
        self.client
            .publish(topic, qos_from_u8(qos), retain, payload)
            .await
            .map_err(ProtocolError::Mqtt)?;
        rx.await
            .map_err(|_| ProtocolError::ChannelClosed("publish ack channel closed".to_string()))?;
        self.touch();
        Ok(PublishOutcome::Acked)
    }

    /// Subscribes to every `(filter, qos)` pair, returning the broker's
    /// per-filter SUBACK reason codes in request order.
    pub async fn subscribe(&self, filters: &BTreeMap<String, u8>) -> Result<SubAckCodes> {
        self.require_live().await?;

        let (tx, rx) = oneshot::channel();
        self.pending.subscribe.lock().push_back(tx);
        for (filter, qos) in filters {
            self.client
                .subscribe(filter, qos_from_u8(*qos))
                .await
                .map_err(ProtocolError::Mqtt)?;
        }
        let codes = rx
            .await
            .map_err(|_| ProtocolError::ChannelClosed("subscribe ack channel closed".to_string()))?;
        *self.state.write().await = ConnectionState::Subscribed;
        self.touch();
        Ok(codes)
    }

    /// Unsubscribes from every listed filter.
    pub async fn unsubscribe(&self, filters: &[String]) -> Result<()> {
        self.require_live().await?;

        let (tx, rx) = oneshot::channel();
        self.pending.unsubscribe.lock().push_back(tx);
        for filter in filters {
            self.client.unsubscribe(filter).await.map_err(ProtocolError::Mqtt)?;
        }
        rx.await
            .map_err(|_| ProtocolError::ChannelClosed("unsubscribe ack channel closed".to_string()))?;
        self.touch();
        Ok(())
    }

    /// Suspends until the next inbound frame arrives.
    pub async fn receive(&self) -> Result<IncomingFrame> {
        self.require_live().await?;
        let mut rx = self.incoming_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| Error::Protocol(ProtocolError::ChannelClosed("incoming channel closed".to_string())))
    }

    /// Sends DISCONNECT with `code` and transitions to `Closed`.
    pub async fn disconnect(&self, code: u8) -> Result<()> {
        *self.state.write().await = ConnectionState::Disconnecting;
        let result = self.client.disconnect().await.map_err(ProtocolError::Mqtt);
        *self.state.write().await = ConnectionState::Closed;
        debug!(pool = %self.pool_name, code, "disconnected");
        result?;
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pool_name", &self.pool_name)
            .field("client_id", &self.config.client_id())
            .finish_non_exhaustive()
    }
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

fn packet_to_connack_result(packet: &Packet) -> std::result::Result<(), u8> {
    match packet {
        Packet::ConnAck(ack) if ack.code == rumqttc::ConnectReturnCode::Success => Ok(()),
        Packet::ConnAck(ack) => Err(ack.code as u8),
        _ => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_incoming(
    packet: Packet,
    incoming_tx: &mpsc::Sender<IncomingFrame>,
    pending: &PendingAcks,
    state: &Arc<RwLock<ConnectionState>>,
    event_bus: &Option<EventBus>,
    pool_name: &str,
    client_id: &str,
    metrics: &Metrics,
) {
    match packet {
        Packet::Publish(publish) => {
            let frame = IncomingFrame {
                frame_type: "publish",
                topic: publish.topic.clone(),
                payload: publish.payload.to_vec(),
                qos: publish.qos as u8,
                dup: publish.dup,
                retain: publish.retain,
                message_id: if publish.pkid == 0 { None } else { Some(publish.pkid) },
                properties: Properties::new(),
            };
            let _ = incoming_tx.send(frame).await;
        }
        Packet::PubAck(_) | Packet::PubComp(_) => {
            if let Some(tx) = pending.publish.lock().pop_front() {
                let _ = tx.send(());
            }
        }
        Packet::SubAck(ack) => {
            if let Some(tx) = pending.subscribe.lock().pop_front() {
                let _ = tx.send(ack.return_codes.iter().map(|c| *c as u8).collect());
            }
        }
        Packet::UnsubAck(_) => {
            if let Some(tx) = pending.unsubscribe.lock().pop_front() {
                let _ = tx.send(());
            }
        }
        Packet::Disconnect(disconnect) => {
            let code = disconnect.reason_code as u8;
            *state.write().await = ConnectionState::Closed;
            if let Some(bus) = event_bus {
                bus.publish(MqttEvent::OnDisconnect(OnDisconnectEvent {
                    disconnect_type: DisconnectType::classify(code),
                    code,
                    pool_name: pool_name.to_string(),
                    client_id: client_id.to_string(),
                    qos: None,
                }));
            }
            if !matches!(DisconnectType::classify(code), DisconnectType::Normal) {
                metrics.errors.incr_disconnect_error(client_id, code);
            }
        }
        _ => {}
    }
}
