// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in event listeners (§4.5, §4.9).
//!
//! Grounded on the teacher's `subscription::callback::CallbackRegistry`
//! dispatch loop, but simplified: listeners here are trait objects driven
//! by a plain `tokio::spawn`'d loop over a `broadcast::Receiver`, not a
//! registry keyed by topic. A listener must never propagate a panic or
//! error back into the bus loop — §4.9 requires that metrics/logging
//! listeners are infallible from the bus's point of view.

use tracing::{debug, warn};

use super::{DisconnectType, MqttEvent};
use crate::client::Client;
use crate::metrics::{ErrorCategory, Metrics};
use crate::pool::ConnectionFactory;
use crate::protocol::Connection;

/// Something that reacts to events published on the [`super::EventBus`].
///
/// Implementations must not block or panic; a slow or misbehaving
/// listener only ever hurts itself (it may see `RecvError::Lagged`), never
/// other listeners or the connections producing events.
pub trait Listener: Send + Sync + 'static {
    /// Handles one event. Must never panic.
    fn on_event(&self, event: &MqttEvent);
}

/// Delegates every `PublishEvent` to [`Client::publish`] (§4.5): the
/// event bus doubles as a publish queue for callers that would rather
/// fire-and-forget than hold a `Client` handle themselves.
///
/// The delegate runs on a spawned task so a slow broker round-trip never
/// blocks the bus's dispatch loop; a failed delegate is logged, not
/// propagated, per §4.9's "listeners are infallible from the bus's point
/// of view".
pub struct PublishListener<F: ConnectionFactory<Connection = Connection> + Clone> {
    client: Client<F>,
}

impl<F: ConnectionFactory<Connection = Connection> + Clone> PublishListener<F> {
    /// Creates a listener that delegates publish requests onto `client`.
    #[must_use]
    pub fn new(client: Client<F>) -> Self {
        Self { client }
    }
}

impl<F: ConnectionFactory<Connection = Connection> + Clone> Listener for PublishListener<F> {
    fn on_event(&self, event: &MqttEvent) {
        let MqttEvent::Publish(publish) = event else { return };
        debug!(topic = %publish.topic, qos = publish.qos, "publish requested");
        let client = self.client.clone();
        let topic = publish.topic.clone();
        let message = publish.message.clone();
        let qos = publish.qos;
        let retain = publish.retain;
        tokio::spawn(async move {
            if let Err(e) = client.publish(&topic, message, qos, retain).await {
                warn!(topic = %topic, error = %e, "delegated publish failed");
            }
        });
    }
}

/// Delegates every `SubscribeEvent` to [`Client::subscribe`], then spawns
/// a long-lived receive loop bound to the resulting client's own pool
/// context (§4.5, §4.7 step 3).
pub struct SubscribeListener<F: ConnectionFactory<Connection = Connection> + Clone> {
    client: Client<F>,
}

impl<F: ConnectionFactory<Connection = Connection> + Clone> SubscribeListener<F> {
    /// Creates a listener that delegates subscribe requests onto `client`.
    #[must_use]
    pub fn new(client: Client<F>) -> Self {
        Self { client }
    }
}

impl<F: ConnectionFactory<Connection = Connection> + Clone> Listener for SubscribeListener<F> {
    fn on_event(&self, event: &MqttEvent) {
        let MqttEvent::Subscribe(subscribe) = event else { return };
        debug!(
            pool_name = ?subscribe.pool_name,
            topics = subscribe.topic_configs.len(),
            "subscribe requested"
        );
        let client = self.client.clone();
        let topic_configs = subscribe.topic_configs.clone();
        let client_id = subscribe.client_id.clone().unwrap_or_else(|| "default".to_string());
        tokio::spawn(async move {
            for topic_config in &topic_configs {
                if let Err(e) = client.subscribe(topic_config, &client_id).await {
                    warn!(client_id = %client_id, error = %e, "delegated subscribe failed");
                    return;
                }
            }
            loop {
                if let Err(e) = client.receive(&client_id).await {
                    debug!(client_id = %client_id, error = %e, "receive loop ended");
                    break;
                }
            }
        });
    }
}

/// Logs every inbound frame at debug level.
#[derive(Debug, Default)]
pub struct OnReceiveListener;

impl Listener for OnReceiveListener {
    fn on_event(&self, event: &MqttEvent) {
        if let MqttEvent::OnReceive(received) = event {
            debug!(
                topic = %received.topic,
                frame_type = %received.frame_type,
                bytes = received.message.len(),
                "frame received"
            );
        }
    }
}

/// Increments [`crate::metrics::ErrorMetrics`] for abnormal disconnects, per
/// the §8 invariant "every `OnDisconnectEvent` with code not in {0x00, 0x04}
/// increments `ErrorMetrics[disconnect_error]` by exactly one".
#[derive(Debug)]
pub struct OnDisconnectListener {
    metrics: Metrics,
}

impl OnDisconnectListener {
    /// Creates a listener that records into `metrics`.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl Listener for OnDisconnectListener {
    fn on_event(&self, event: &MqttEvent) {
        if let MqttEvent::OnDisconnect(disconnect) = event {
            match disconnect.disconnect_type {
                DisconnectType::Normal => {
                    debug!(client_id = %disconnect.client_id, code = disconnect.code, "connection closed");
                }
                DisconnectType::Error => {
                    warn!(
                        client_id = %disconnect.client_id,
                        code = disconnect.code,
                        "connection closed with error"
                    );
                    self.metrics
                        .errors
                        .incr_disconnect_error(&disconnect.client_id, disconnect.code);
                }
            }
        }
    }
}

/// Marker listener fired once an auto-subscriber worker completes warm-up
/// (§4.7). Exists so hosts can hook readiness without polling the
/// subscription registry.
#[derive(Debug, Default)]
pub struct AfterWorkerStartListener;

impl Listener for AfterWorkerStartListener {
    fn on_event(&self, event: &MqttEvent) {
        if let MqttEvent::OnSubscribe(subscribe) = event {
            if subscribe.result.is_success() {
                debug!(client_id = %subscribe.client_id, "worker subscriber started");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::{validate_connection, validate_pool, RawClientConfig, RawPoolConfig};
    use crate::event::{OnDisconnectEvent, OnSubscribeEvent, OperationResult, PublishEvent};
    use crate::pool::Pool;
    use crate::protocol::RumqttcConnectionFactory;
    use crate::subscription::SubscriptionRegistry;

    /// A `Client` over a real factory whose `create()` is never reached by
    /// these tests (they only exercise the non-matching-event path, or
    /// check that the matching path returns without blocking).
    fn test_client() -> Client<RumqttcConnectionFactory> {
        let config = Arc::new(
            validate_connection(&RawClientConfig {
                host: "broker.invalid".to_string(),
                port: 1883,
                client_id: "listener-test".to_string(),
                keep_alive: 30,
                protocol_level: 5,
                ..Default::default()
            })
            .unwrap(),
        );
        let pool_config = validate_pool(&RawPoolConfig { min_connections: 0, max_connections: 1, ..Default::default() }).unwrap();
        let metrics = Metrics::new();
        let factory = RumqttcConnectionFactory::new("default", config, Duration::from_secs(1), None, metrics.clone());
        let pool = Pool::new("default", factory, pool_config, metrics.clone());
        Client::new(pool, SubscriptionRegistry::new(), None, metrics)
    }

    #[test]
    fn disconnect_listener_increments_on_error_only() {
        let metrics = Metrics::new();
        let listener = OnDisconnectListener::new(metrics.clone());

        listener.on_event(&MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Normal,
            code: 0x00,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        }));
        assert_eq!(metrics.errors.total_for_category(ErrorCategory::DisconnectError), 0);

        listener.on_event(&MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Error,
            code: 0x8E,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        }));
        assert_eq!(metrics.errors.total_for_category(ErrorCategory::DisconnectError), 1);
    }

    #[tokio::test]
    async fn publish_listener_ignores_non_publish_events() {
        let listener = PublishListener::new(test_client());
        listener.on_event(&MqttEvent::OnSubscribe(OnSubscribeEvent {
            topics: vec!["t".to_string()],
            client_id: "c1".to_string(),
            pool_name: "default".to_string(),
            result: OperationResult::Success,
        }));
    }

    #[tokio::test]
    async fn publish_listener_spawns_delegate_without_blocking() {
        let listener = PublishListener::new(test_client());
        // The delegated `Client::publish` call runs on a spawned task, so
        // this returns immediately regardless of whether the broker is
        // reachable.
        listener.on_event(&MqttEvent::Publish(PublishEvent {
            topic: "t".to_string(),
            message: vec![1, 2, 3],
            qos: 1,
            properties: Default::default(),
            dup: false,
            retain: false,
            pool_name: None,
        }));
    }

    #[tokio::test]
    async fn subscribe_listener_ignores_non_subscribe_events() {
        let listener = SubscribeListener::new(test_client());
        listener.on_event(&MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Normal,
            code: 0x00,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        }));
    }
}
