// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw (pre-validation), `serde`-deserializable configuration shapes.
//!
//! These mirror the fields a configuration document or environment
//! override can supply. They carry no invariants of their own; passing one
//! through [`super::validate_connection`], [`super::validate_topic`], or
//! [`super::validate_pool`] is what produces a trusted, immutable record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Last-will message attached to a `ClientConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Will {
    /// Topic the will message is published to.
    pub topic: String,
    /// Will payload.
    pub payload: String,
    /// QoS the will is published with.
    pub qos: u8,
    /// Whether the will is published with the retain flag set.
    pub retain: bool,
}

/// Pre-validation connection fields (§4.1 table).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawClientConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u32,
    #[serde(default)]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub keep_alive: u32,
    #[serde(default = "default_protocol_level")]
    pub protocol_level: u8,
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    pub will: Option<Will>,
}

fn default_protocol_level() -> u8 {
    5
}

fn default_clean_session() -> bool {
    true
}

/// Which MQTT v5 subscription style a `TopicConfig` resolves to.
///
/// Exactly one style is active per record (§3 invariant); `enable_share_topic`
/// and `enable_queue_topic` are mutually exclusive (see DESIGN.md for the
/// Open Question this resolves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStyle {
    /// A plain (non-shared, non-queue) subscription.
    Plain,
    /// A `$share/<group>/<topic>` subscription, one entry per group.
    Shared(ShareGroups),
    /// A `$queue/<topic>` subscription.
    Queue,
}

/// Non-empty set of MQTT v5 shared-subscription group names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGroups(BTreeSet<String>);

impl ShareGroups {
    /// Builds a group set from an iterator of group names.
    pub fn new(groups: impl IntoIterator<Item = String>) -> Self {
        Self(groups.into_iter().collect())
    }

    /// Iterates over the group names in a deterministic (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Pre-validation topic fields (§3 `TopicConfig`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTopicConfig {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub no_local: bool,
    #[serde(default)]
    pub retain_as_published: bool,
    #[serde(default)]
    pub retain_handling: u8,
    #[serde(default)]
    pub enable_share_topic: bool,
    #[serde(default)]
    pub share_topic_groups: Vec<String>,
    #[serde(default)]
    pub enable_queue_topic: bool,
    #[serde(default)]
    pub enable_multisub: bool,
    #[serde(default = "default_multisub_num")]
    pub multisub_num: u32,
    #[serde(default)]
    pub auto_subscribe: bool,
    pub handler_class: Option<String>,
}

fn default_multisub_num() -> u32 {
    1
}

/// Pre-validation pool-sizing fields (§3 `PoolConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPoolConfig {
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_s")]
    pub connect_timeout_s: u32,
    #[serde(default = "default_wait_timeout_s")]
    pub wait_timeout_s: u32,
    /// `None` (or the literal string `"none"` in a config document) disables
    /// PINGREQ-based idle health checks.
    #[serde(default)]
    pub heartbeat_s: Option<u32>,
    #[serde(default = "default_max_idle_time_s")]
    pub max_idle_time_s: u32,
}

impl Default for RawPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: default_max_connections(),
            connect_timeout_s: default_connect_timeout_s(),
            wait_timeout_s: default_wait_timeout_s(),
            heartbeat_s: None,
            max_idle_time_s: default_max_idle_time_s(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_s() -> u32 {
    10
}

fn default_wait_timeout_s() -> u32 {
    5
}

fn default_max_idle_time_s() -> u32 {
    300
}

/// Debug Tap enablement and endpoint path (§6 configuration document).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Whether the debug tap server is started.
    #[serde(default)]
    pub enabled: bool,
    /// Filesystem path of the stream-socket endpoint.
    #[serde(default)]
    pub socket_path: String,
}
