// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client Facade (§4.4): the public surface applications call.
//!
//! Grounded on the teacher's `protocol::mqtt_pooled::PooledMqttClient`:
//! borrow a pooled connection, delegate one protocol operation, fire the
//! matching event, release. Every public method here follows that exact
//! shape (§4.4 "Borrowing discipline").

use crate::config::TopicConfig;
use crate::error::{Error, Result, ValidationError};
use crate::event::{EventBus, MqttEvent, OnPublishEvent, OnReceiveEvent, OnSubscribeEvent, OperationResult};
use crate::metrics::Metrics;
use crate::pool::{ConnectionFactory, Pool};
use crate::protocol::{Connection, IncomingFrame};
use crate::subscription::{SubscriptionRecord, SubscriptionRegistry};
use crate::topic;

fn validate_qos(qos: u8) -> std::result::Result<(), ValidationError> {
    if qos <= 2 {
        Ok(())
    } else {
        Err(ValidationError::new("qos", "qos invalid"))
    }
}

fn validate_topic_string(topic: &str) -> std::result::Result<(), ValidationError> {
    crate::config::validate_topic(&crate::config::RawTopicConfig {
        topic: topic.to_string(),
        qos: 0,
        multisub_num: 1,
        ..Default::default()
    })
    .map(|_| ())
    .map_err(Into::into)
}

/// Public surface over one pool (§4.4).
///
/// `Client` is cheap to clone: it holds only shared handles (the pool,
/// the registry, an optional event bus, metrics).
#[derive(Clone)]
pub struct Client<F: ConnectionFactory<Connection = Connection>> {
    pool: Pool<F>,
    registry: SubscriptionRegistry,
    event_bus: Option<EventBus>,
    metrics: Metrics,
}

impl<F: ConnectionFactory<Connection = Connection>> Client<F> {
    /// Creates a facade over `pool`, recording subscriptions in `registry`
    /// and optionally emitting events onto `event_bus`.
    #[must_use]
    pub fn new(pool: Pool<F>, registry: SubscriptionRegistry, event_bus: Option<EventBus>, metrics: Metrics) -> Self {
        Self { pool, registry, event_bus, metrics }
    }

    fn emit(&self, event: MqttEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    /// Publishes `message` to `topic` (§4.4).
    pub async fn publish(
        &self,
        topic: &str,
        message: Vec<u8>,
        qos: u8,
        retain: bool,
    ) -> Result<()> {
        validate_topic_string(topic).map_err(|e| {
            self.metrics.validation.incr_failure("publish.topic", e.reason.clone());
            Error::Validation(e)
        })?;
        validate_qos(qos).map_err(|e| {
            self.metrics.validation.incr_failure("publish.qos", e.reason.clone());
            Error::Validation(e)
        })?;
        self.metrics.validation.incr_success("publish");

        let lease = self.pool.borrow(None).await?;
        let result = lease.connection().publish(topic, message.clone(), qos, retain).await;
        let outcome = match &result {
            Ok(_) => OperationResult::Success,
            Err(e) => OperationResult::Failed(e.to_string()),
        };
        self.emit(MqttEvent::OnPublish(OnPublishEvent {
            topic: topic.to_string(),
            message,
            qos,
            result: outcome,
            pool_name: self.pool.name().to_string(),
        }));
        lease.release().await?;
        result.map(|_| ())
    }

    /// Subscribes to every filter produced by expanding `topic_config`
    /// (§4.4, §4.8), recording a [`SubscriptionRecord`] per resulting
    /// filter.
    pub async fn subscribe(&self, topic_config: &TopicConfig, client_id: &str) -> Result<()> {
        let filters = topic::to_subscribe_map(topic_config);

        let lease = self.pool.borrow(Some(client_id)).await?;
        let result = lease.connection().subscribe(&filters).await;

        let outcome = match &result {
            Ok(_) => OperationResult::Success,
            Err(e) => OperationResult::Failed(e.to_string()),
        };
        if result.is_ok() {
            for filter in filters.keys() {
                let group = match topic_config.style() {
                    crate::config::SubscriptionStyle::Shared(groups) => groups.iter().next(),
                    _ => None,
                };
                let record = SubscriptionRecord::new(
                    self.pool.name(),
                    filter,
                    client_id,
                    topic_config.qos(),
                    topic_config.style(),
                    group,
                );
                self.registry.add(record);
            }
        }
        self.emit(MqttEvent::OnSubscribe(OnSubscribeEvent {
            topics: filters.keys().cloned().collect(),
            client_id: client_id.to_string(),
            pool_name: self.pool.name().to_string(),
            result: outcome,
        }));
        lease.release().await?;
        result.map(|_| ())
    }

    /// Unsubscribes `client_id` from every listed filter, removing the
    /// matching [`SubscriptionRecord`]s.
    pub async fn unsubscribe(&self, filters: &[String], client_id: &str) -> Result<()> {
        let lease = self.pool.borrow(Some(client_id)).await?;
        lease.connection().unsubscribe(filters).await?;
        for filter in filters {
            self.registry.remove(self.pool.name(), filter, client_id);
        }
        lease.release().await?;
        Ok(())
    }

    /// Returns the next incoming frame on the connection bound to
    /// `client_id`'s context. Fails with [`Error::NotSubscribed`] if
    /// `client_id` has no bound subscriber connection.
    pub async fn receive(&self, client_id: &str) -> Result<IncomingFrame> {
        if self.registry.list(self.pool.name()).iter().all(|r| r.client_id() != client_id) {
            return Err(Error::NotSubscribed);
        }
        let lease = self.pool.borrow(Some(client_id)).await?;
        let frame = lease.connection().receive().await;
        if let Ok(frame) = &frame {
            self.emit(MqttEvent::OnReceive(OnReceiveEvent {
                frame_type: frame.frame_type.to_string(),
                topic: frame.topic.clone(),
                message: frame.payload.clone(),
                qos: frame.qos,
                dup: frame.dup,
                retain: frame.retain,
                message_id: frame.message_id,
                properties: frame.properties.clone(),
                pool_name: self.pool.name().to_string(),
            }));
        }
        lease.release().await?;
        frame
    }

    /// Whether any record for `client_id` exists in this pool's
    /// subscription registry.
    #[must_use]
    pub fn is_subscribed(&self, client_id: &str) -> bool {
        self.registry.list(self.pool.name()).iter().any(|r| r.client_id() == client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_validation_rejects_out_of_range() {
        assert!(validate_qos(3).is_err());
        assert!(validate_qos(0).is_ok());
        assert!(validate_qos(2).is_ok());
    }

    #[test]
    fn topic_validation_rejects_malformed_wildcard() {
        assert!(validate_topic_string("sensors/temp+/data").is_err());
        assert!(validate_topic_string("sensors/+/temperature/#").is_ok());
    }
}
