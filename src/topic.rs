// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure string builders for MQTT v5 shared and queue subscription filters
//! (§4.8).
//!
//! Grounded on `protocol::topic_router::ParsedTopic`'s split-and-rebuild
//! idiom in the teacher crate; this module performs no validation (that is
//! [`crate::config::validate_topic`]'s job) and no I/O.

use std::collections::BTreeMap;

use crate::config::{SubscriptionStyle, TopicConfig};

/// Builds the plain (non-shared, non-queue) filter for a topic.
#[must_use]
pub fn plain(topic: &str, qos: u8) -> (String, u8) {
    (topic.to_string(), qos)
}

/// Builds a `$share/<group>/<topic>` filter.
#[must_use]
pub fn shared(topic: &str, group: &str) -> String {
    let group = if group.is_empty() { "default" } else { group };
    format!("$share/{group}/{topic}")
}

/// Builds a `$queue/<topic>` filter.
#[must_use]
pub fn queue(topic: &str) -> String {
    format!("$queue/{topic}")
}

/// Matches `topic` (a concrete publish topic) against `filter` (a
/// subscription filter, which may use `+`/`#` wildcards), per the MQTT
/// topic-matching algorithm used for the Debug Shell's `where topic like`
/// and `filter_by_topic` queries (§4.11.1, §4.11.2).
#[must_use]
pub fn filter_matches(filter: &str, topic: &str) -> bool {
    let filter_levels: Vec<&str> = filter.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    let mut fi = 0;
    let mut ti = 0;
    while fi < filter_levels.len() {
        match filter_levels[fi] {
            "#" => return true,
            "+" => {
                if ti >= topic_levels.len() {
                    return false;
                }
            }
            level => {
                if ti >= topic_levels.len() || topic_levels[ti] != level {
                    return false;
                }
            }
        }
        fi += 1;
        ti += 1;
    }
    ti == topic_levels.len()
}

/// Expands a [`TopicConfig`] into the set of filters to pass to
/// `subscribe()`.
///
/// - [`SubscriptionStyle::Shared`] emits one entry per configured group.
/// - [`SubscriptionStyle::Queue`] emits the single queue-form filter.
/// - [`SubscriptionStyle::Plain`] emits the topic unchanged.
///
/// Iteration order over groups is the group names' sorted order
/// ([`crate::config::ShareGroups`] is backed by a `BTreeSet`), so this
/// function is deterministic.
#[must_use]
pub fn to_subscribe_map(topic_config: &TopicConfig) -> BTreeMap<String, u8> {
    let mut map = BTreeMap::new();
    match topic_config.style() {
        SubscriptionStyle::Shared(groups) => {
            for group in groups.iter() {
                map.insert(shared(topic_config.topic(), group), topic_config.qos());
            }
        }
        SubscriptionStyle::Queue => {
            map.insert(queue(topic_config.topic()), topic_config.qos());
        }
        SubscriptionStyle::Plain => {
            let (filter, qos) = plain(topic_config.topic(), topic_config.qos());
            map.insert(filter, qos);
        }
    }
    map
}
