// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration types and validators (§4.1).
//!
//! [`ClientConfig`], [`TopicConfig`], and [`PoolConfig`] are immutable once
//! validated. The three `validate_*` functions are pure: they accept a raw,
//! `serde`-deserialized representation and either return a validated record
//! or a [`ConfigError`] naming the offending field.

mod loader;
mod types;
mod validate;

pub use loader::{RootConfig, load_from_file, load_with_env_overrides};
pub use types::{
    DebugConfig, RawClientConfig, RawPoolConfig, RawTopicConfig, ShareGroups, SubscriptionStyle,
    Will,
};
pub use validate::{sanitize_topic_name, validate_connection, validate_pool, validate_topic};

use crate::error::ConfigError;

/// Immutable, validated broker connection configuration.
///
/// Created once by [`validate_connection`] and shared (never mutated) by
/// every pooled [`crate::protocol::Connection`] that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
    keep_alive: u16,
    protocol_level: u8,
    clean_session: bool,
    will: Option<Will>,
}

impl ClientConfig {
    /// Host name or address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// MQTT client identifier.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Username for broker authentication, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Password for broker authentication, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Keep-alive interval in seconds.
    #[must_use]
    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// MQTT protocol level: 3, 4, or 5.
    #[must_use]
    pub fn protocol_level(&self) -> u8 {
        self.protocol_level
    }

    /// Whether the broker should discard any previous session.
    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// The last-will message, if configured.
    #[must_use]
    pub fn will(&self) -> Option<&Will> {
        self.will.as_ref()
    }

    /// Derives a `ClientConfig` for an auto-subscriber using the same
    /// broker identity but a distinct client id (§4.7 step 3).
    #[must_use]
    pub fn with_client_id(&self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..self.clone()
        }
    }
}

/// Immutable, validated topic configuration (§3 `TopicConfig`).
#[derive(Debug, Clone, PartialEq)]
pub struct TopicConfig {
    topic: String,
    qos: u8,
    no_local: bool,
    retain_as_published: bool,
    retain_handling: u8,
    style: SubscriptionStyle,
    enable_multisub: bool,
    multisub_num: u32,
    auto_subscribe: bool,
    handler_class: Option<String>,
}

impl TopicConfig {
    /// The MQTT topic or filter this configuration describes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Requested QoS level (0, 1, or 2).
    #[must_use]
    pub fn qos(&self) -> u8 {
        self.qos
    }

    /// MQTT v5 No Local subscription option.
    #[must_use]
    pub fn no_local(&self) -> bool {
        self.no_local
    }

    /// MQTT v5 Retain As Published subscription option.
    #[must_use]
    pub fn retain_as_published(&self) -> bool {
        self.retain_as_published
    }

    /// MQTT v5 Retain Handling option (0, 1, or 2).
    #[must_use]
    pub fn retain_handling(&self) -> u8 {
        self.retain_handling
    }

    /// Which subscription style (plain, shared, or queue) applies.
    #[must_use]
    pub fn style(&self) -> &SubscriptionStyle {
        &self.style
    }

    /// Whether multiple parallel subscriber clients should be created.
    #[must_use]
    pub fn enable_multisub(&self) -> bool {
        self.enable_multisub
    }

    /// Number of parallel subscriber clients when `enable_multisub` is set.
    #[must_use]
    pub fn multisub_num(&self) -> u32 {
        self.multisub_num
    }

    /// Whether this topic should be subscribed automatically on warm-up.
    #[must_use]
    pub fn auto_subscribe(&self) -> bool {
        self.auto_subscribe
    }

    /// Opaque handler identifier consulted by `OnReceiveListener`.
    #[must_use]
    pub fn handler_class(&self) -> Option<&str> {
        self.handler_class.as_deref()
    }
}

/// Immutable, validated connection-pool sizing configuration (§3 `PoolConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    min_connections: u32,
    max_connections: u32,
    connect_timeout_s: u32,
    wait_timeout_s: u32,
    heartbeat_s: Option<u32>,
    max_idle_time_s: u32,
}

impl PoolConfig {
    /// Minimum number of warm connections the pool maintains.
    #[must_use]
    pub fn min_connections(&self) -> u32 {
        self.min_connections
    }

    /// Maximum number of live connections the pool will create.
    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Deadline, in seconds, for establishing a new connection.
    #[must_use]
    pub fn connect_timeout_s(&self) -> u32 {
        self.connect_timeout_s
    }

    /// Deadline, in seconds, for a caller's `borrow()` to succeed.
    #[must_use]
    pub fn wait_timeout_s(&self) -> u32 {
        self.wait_timeout_s
    }

    /// PINGREQ interval in seconds, or `None` to disable heartbeats.
    #[must_use]
    pub fn heartbeat_s(&self) -> Option<u32> {
        self.heartbeat_s
    }

    /// Seconds a borrowed-but-idle connection may live before health-check.
    #[must_use]
    pub fn max_idle_time_s(&self) -> u32 {
        self.max_idle_time_s
    }
}

pub(crate) fn err(field: &str, reason: &str) -> ConfigError {
    ConfigError::new(field, reason)
}
