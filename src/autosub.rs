// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Auto-Subscriber (§4.7): warm-up fan-out over every `auto_subscribe`
//! topic, one or more subscriber clients per topic depending on
//! `enable_multisub`/`multisub_num`.
//!
//! Grounded on the teacher's warm-up-time device registration in
//! `manager::device_manager`, generalized from "one device per config
//! entry" to "N subscriber client ids per topic entry".

use tracing::debug;

use crate::client::Client;
use crate::config::TopicConfig;
use crate::error::Result;
use crate::pool::ConnectionFactory;
use crate::protocol::Connection;

/// Derives the `n`-th subscriber client id for `base`, per §4.7 step 3:
/// a deterministic `<base>-<n>` suffix.
#[must_use]
pub fn subscriber_client_id(base: &str, n: u32) -> String {
    format!("{base}-{n}")
}

/// Number of subscriber clients a topic configuration warm-up should
/// create (§4.7 step 2).
#[must_use]
pub fn subscriber_count(topic_config: &TopicConfig) -> u32 {
    if topic_config.enable_multisub() {
        topic_config.multisub_num().max(1)
    } else {
        1
    }
}

/// Subscribes `client_id_base`-derived clients for every `auto_subscribe`
/// topic in `topics`, skipping any filter the registry already knows
/// about (§4.7 "re-entry safety"). Each newly subscribed client id gets
/// its own long-lived receive loop, bound to its own pool context
/// (§4.7 step 3), spawned as a background task.
///
/// Returns the number of subscribe calls actually issued.
pub async fn warm_up<F: ConnectionFactory<Connection = Connection> + Clone>(
    client: &Client<F>,
    client_id_base: &str,
    topics: &[TopicConfig],
) -> Result<u32> {
    let mut issued = 0;
    for topic_config in topics.iter().filter(|t| t.auto_subscribe()) {
        for n in 0..subscriber_count(topic_config) {
            let client_id = subscriber_client_id(client_id_base, n);
            if client.is_subscribed(&client_id) {
                continue;
            }
            client.subscribe(topic_config, &client_id).await?;
            issued += 1;

            let receiver = client.clone();
            let receiver_id = client_id.clone();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = receiver.receive(&receiver_id).await {
                        debug!(client_id = %receiver_id, error = %e, "receive loop ended");
                        break;
                    }
                }
            });
        }
    }
    Ok(issued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawTopicConfig, validate_topic};

    fn topic_config(raw: RawTopicConfig) -> TopicConfig {
        validate_topic(&raw).unwrap()
    }

    #[test]
    fn scenario_s2_multisub_client_ids() {
        // TopicConfig{auto_subscribe:true, enable_multisub:true, multisub_num:3}
        // with base "w" => client ids "w-0", "w-1", "w-2".
        let config = topic_config(RawTopicConfig {
            topic: "jobs/work".to_string(),
            qos: 1,
            enable_multisub: true,
            multisub_num: 3,
            auto_subscribe: true,
            ..Default::default()
        });

        assert_eq!(subscriber_count(&config), 3);
        let ids: Vec<String> = (0..subscriber_count(&config))
            .map(|n| subscriber_client_id("w", n))
            .collect();
        assert_eq!(ids, vec!["w-0", "w-1", "w-2"]);
    }

    #[test]
    fn single_subscriber_without_multisub() {
        let config = topic_config(RawTopicConfig {
            topic: "jobs/work".to_string(),
            qos: 1,
            auto_subscribe: true,
            multisub_num: 1,
            ..Default::default()
        });
        assert_eq!(subscriber_count(&config), 1);
    }

    #[test]
    fn multisub_num_ignored_without_enable_multisub() {
        // multisub_num only takes effect when enable_multisub is set;
        // otherwise exactly one subscriber client is created.
        let config = topic_config(RawTopicConfig {
            topic: "jobs/work".to_string(),
            qos: 1,
            enable_multisub: false,
            multisub_num: 5,
            auto_subscribe: true,
            ..Default::default()
        });
        assert_eq!(subscriber_count(&config), 1);
    }
}
