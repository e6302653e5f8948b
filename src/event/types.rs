// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event record shapes carried over the event bus (§3 "Event Objects").
//!
//! Grounded on the teacher's `event::DeviceEvent`: a single tagged-variant
//! enum with per-variant constructors, replacing a class-per-event scheme
//! with static enumeration (§9 Design Notes).

use std::collections::BTreeMap;

use crate::config::TopicConfig;

/// MQTT v5 user properties, keyed and ordered deterministically.
pub type Properties = BTreeMap<String, String>;

/// Outcome of a publish or subscribe operation, as reported back on the
/// event bus by `OnPublishEvent`/`OnSubscribeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The broker acknowledged the operation.
    Success,
    /// The operation failed; carries a short human-readable reason.
    Failed(String),
}

impl OperationResult {
    /// Whether the operation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Whether an `OnDisconnectEvent` represents an orderly shutdown or a
/// protocol-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectType {
    /// Reason code 0x00 (normal) or 0x04 (disconnect with will message).
    Normal,
    /// Any other reason code.
    Error,
}

impl DisconnectType {
    /// Classifies a broker DISCONNECT reason code per §4.9: codes `0x00`
    /// and `0x04` are normal, everything else is an error.
    #[must_use]
    pub fn classify(code: u8) -> Self {
        match code {
            0x00 | 0x04 => Self::Normal,
            _ => Self::Error,
        }
    }
}

/// All events carried on the in-process event bus (§3, §4.5).
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// Requests that a message be published.
    Publish(PublishEvent),
    /// Requests that one or more topics be subscribed.
    Subscribe(SubscribeEvent),
    /// An incoming frame arrived on a subscriber connection.
    OnReceive(OnReceiveEvent),
    /// A publish operation completed (successfully or not).
    OnPublish(OnPublishEvent),
    /// A subscribe operation completed (successfully or not).
    OnSubscribe(OnSubscribeEvent),
    /// A connection was closed, normally or due to an error.
    OnDisconnect(OnDisconnectEvent),
}

impl MqttEvent {
    /// Short tag used for logging and metrics bucketing.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Publish(_) => "publish",
            Self::Subscribe(_) => "subscribe",
            Self::OnReceive(_) => "on_receive",
            Self::OnPublish(_) => "on_publish",
            Self::OnSubscribe(_) => "on_subscribe",
            Self::OnDisconnect(_) => "on_disconnect",
        }
    }
}

/// Requests a publish (§3).
#[derive(Debug, Clone)]
pub struct PublishEvent {
    /// Topic to publish to.
    pub topic: String,
    /// Message payload.
    pub message: Vec<u8>,
    /// QoS level.
    pub qos: u8,
    /// MQTT v5 user properties.
    pub properties: Properties,
    /// Duplicate-delivery flag.
    pub dup: bool,
    /// Retain flag.
    pub retain: bool,
    /// Name of the pool to publish through; `None` selects `default`.
    pub pool_name: Option<String>,
}

/// Requests one or more subscriptions (§3).
#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    /// Topic configurations to expand and subscribe.
    pub topic_configs: Vec<TopicConfig>,
    /// Name of the pool to subscribe through; `None` selects `default`.
    pub pool_name: Option<String>,
    /// Client id to subscribe as; `None` lets the subscriber pick one.
    pub client_id: Option<String>,
}

/// An incoming frame on a subscriber connection (§3).
#[derive(Debug, Clone)]
pub struct OnReceiveEvent {
    /// MQTT packet type the frame represents (e.g. `"publish"`).
    pub frame_type: String,
    /// Topic the frame arrived on.
    pub topic: String,
    /// Message payload.
    pub message: Vec<u8>,
    /// QoS the frame was delivered at.
    pub qos: u8,
    /// Duplicate-delivery flag.
    pub dup: bool,
    /// Retain flag.
    pub retain: bool,
    /// Broker-assigned packet identifier, if any (QoS 1/2 only).
    pub message_id: Option<u16>,
    /// MQTT v5 user properties.
    pub properties: Properties,
    /// Name of the pool this frame arrived on.
    pub pool_name: String,
}

/// Reports the outcome of a publish (§3).
#[derive(Debug, Clone)]
pub struct OnPublishEvent {
    /// Topic that was published to.
    pub topic: String,
    /// Message payload that was published.
    pub message: Vec<u8>,
    /// QoS level used.
    pub qos: u8,
    /// Outcome of the publish.
    pub result: OperationResult,
    /// Name of the pool the publish went through.
    pub pool_name: String,
}

/// Reports the outcome of a subscribe (§3).
#[derive(Debug, Clone)]
pub struct OnSubscribeEvent {
    /// Topic filters that were requested.
    pub topics: Vec<String>,
    /// Client id the subscription was made as.
    pub client_id: String,
    /// Name of the pool the subscribe went through.
    pub pool_name: String,
    /// Outcome of the subscribe.
    pub result: OperationResult,
}

/// Reports that a connection was closed (§3).
#[derive(Debug, Clone)]
pub struct OnDisconnectEvent {
    /// Whether this was a normal or error disconnect.
    pub disconnect_type: DisconnectType,
    /// Broker reason code.
    pub code: u8,
    /// Name of the pool the connection belonged to.
    pub pool_name: String,
    /// Client id of the connection that disconnected.
    pub client_id: String,
    /// QoS of the in-flight operation at disconnect time, if any.
    pub qos: Option<u8>,
}
