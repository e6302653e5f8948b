// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription Registry (§4.6): a process-wide record of active
//! subscriptions, keyed by `(pool_name, topic_filter, client_id)`.
//!
//! Grounded on the teacher's `subscription::callback::CallbackRegistry`:
//! an `RwLock`-guarded map behind a cheaply cloneable handle. The teacher
//! keys callbacks by a generated [`crate::metrics`]-style id; this registry
//! instead keys records by the natural uniqueness tuple the domain
//! specifies, since records here are queried by identity, not dispatched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::SubscriptionStyle;

/// Which style a recorded subscription was made with, plus the group name
/// when shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStyle {
    /// A plain (non-shared, non-queue) subscription.
    Plain,
    /// A `$share/<group>/<topic>` subscription.
    Shared(String),
    /// A `$queue/<topic>` subscription.
    Queue,
}

impl RecordStyle {
    fn from_style(style: &SubscriptionStyle, group: Option<&str>) -> Self {
        match style {
            SubscriptionStyle::Plain => Self::Plain,
            SubscriptionStyle::Queue => Self::Queue,
            SubscriptionStyle::Shared(_) => Self::Shared(group.unwrap_or("default").to_string()),
        }
    }
}

/// One active subscription (§3 "Subscription Record").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pool_name: String,
    topic_filter: String,
    client_id: String,
    qos: u8,
    style: RecordStyle,
}

impl SubscriptionRecord {
    /// Creates a new subscription record.
    #[must_use]
    pub fn new(
        pool_name: impl Into<String>,
        topic_filter: impl Into<String>,
        client_id: impl Into<String>,
        qos: u8,
        style: &SubscriptionStyle,
        group: Option<&str>,
    ) -> Self {
        Self {
            pool_name: pool_name.into(),
            topic_filter: topic_filter.into(),
            client_id: client_id.into(),
            qos,
            style: RecordStyle::from_style(style, group),
        }
    }

    /// Name of the pool this subscription was made through.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// The exact MQTT filter string subscribed (already `$share`/`$queue`
    /// prefixed if applicable).
    #[must_use]
    pub fn topic_filter(&self) -> &str {
        &self.topic_filter
    }

    /// Client id that owns this subscription.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// QoS the subscription was made at.
    #[must_use]
    pub fn qos(&self) -> u8 {
        self.qos
    }

    /// Subscription style, with group name when shared.
    #[must_use]
    pub fn style(&self) -> &RecordStyle {
        &self.style
    }

    fn key(&self) -> (String, String, String) {
        (self.pool_name.clone(), self.topic_filter.clone(), self.client_id.clone())
    }
}

/// Outcome of [`SubscriptionRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was new and has been stored.
    Added,
    /// An identical `(pool, topic, client_id)` record already existed; the
    /// registry was left unchanged.
    Duplicate,
}

#[derive(Debug, Default)]
struct RegistryInner {
    records: RwLock<HashMap<(String, String, String), SubscriptionRecord>>,
}

/// Process-wide subscription registry (§4.6).
///
/// Cheap to clone: every clone shares the same underlying map, matching
/// the teacher's `Arc<RwLock<_>>`-backed registry handle pattern.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` if no record with the same `(pool, topic,
    /// client_id)` key already exists.
    pub fn add(&self, record: SubscriptionRecord) -> AddOutcome {
        let mut records = self.inner.records.write();
        let key = record.key();
        if records.contains_key(&key) {
            return AddOutcome::Duplicate;
        }
        records.insert(key, record);
        AddOutcome::Added
    }

    /// Removes the record matching `(pool, topic_filter, client_id)`, if
    /// any. Returns whether a record was removed.
    pub fn remove(&self, pool: &str, topic_filter: &str, client_id: &str) -> bool {
        let key = (pool.to_string(), topic_filter.to_string(), client_id.to_string());
        self.inner.records.write().remove(&key).is_some()
    }

    /// Removes every record belonging to `client_id` within `pool`, e.g.
    /// on client disconnect. Returns the number removed.
    pub fn remove_client(&self, pool: &str, client_id: &str) -> usize {
        let mut records = self.inner.records.write();
        let before = records.len();
        records.retain(|(p, _, c), _| !(p == pool && c == client_id));
        before - records.len()
    }

    /// Whether a record matching the exact key exists.
    #[must_use]
    pub fn contains(&self, pool: &str, topic_filter: &str, client_id: &str) -> bool {
        let key = (pool.to_string(), topic_filter.to_string(), client_id.to_string());
        self.inner.records.read().contains_key(&key)
    }

    /// Lists every record belonging to `pool`, in no particular order.
    #[must_use]
    pub fn list(&self, pool: &str) -> Vec<SubscriptionRecord> {
        self.inner
            .records
            .read()
            .values()
            .filter(|record| record.pool_name == pool)
            .cloned()
            .collect()
    }

    /// Total number of active records across every pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
