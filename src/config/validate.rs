// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure validators for broker, topic, and pool configuration (§4.1).

use crate::error::ConfigError;

use super::types::{RawClientConfig, RawPoolConfig, RawTopicConfig, ShareGroups, SubscriptionStyle};
use super::{ClientConfig, PoolConfig, TopicConfig, err};

/// Validates a raw connection configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] naming the first field that fails validation, in
/// the order: `host`, `port`, `client_id`, `keep_alive`, `protocol_level`.
pub fn validate_connection(raw: &RawClientConfig) -> Result<ClientConfig, ConfigError> {
    if raw.host.trim().is_empty() {
        return Err(err("host", "host required"));
    }

    if raw.port == 0 || raw.port > u32::from(u16::MAX) {
        return Err(err("port", "port out of range"));
    }
    #[allow(clippy::cast_possible_truncation)]
    let port = raw.port as u16;

    validate_protocol_level(raw.protocol_level)?;
    validate_client_id(&raw.client_id, raw.protocol_level)?;

    if raw.keep_alive > u32::from(u16::MAX) {
        return Err(err("keep_alive", "keep_alive out of range"));
    }
    #[allow(clippy::cast_possible_truncation)]
    let keep_alive = raw.keep_alive as u16;

    if let Some(will) = &raw.will {
        validate_qos(will.qos)?;
    }

    Ok(ClientConfig {
        host: raw.host.clone(),
        port,
        client_id: raw.client_id.clone(),
        username: raw.username.clone(),
        password: raw.password.clone(),
        keep_alive,
        protocol_level: raw.protocol_level,
        clean_session: raw.clean_session,
        will: raw.will.clone(),
    })
}

fn validate_protocol_level(level: u8) -> Result<(), ConfigError> {
    match level {
        3 | 4 | 5 => Ok(()),
        _ => Err(err("protocol_level", "protocol_level invalid")),
    }
}

fn validate_client_id(client_id: &str, protocol_level: u8) -> Result<(), ConfigError> {
    if client_id.is_empty() {
        return Err(err("client_id", "client_id invalid"));
    }

    if !client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(err("client_id", "client_id invalid"));
    }

    let max_len = if protocol_level == 3 { 23 } else { 65535 };
    if client_id.chars().count() > max_len {
        return Err(err("client_id", "client_id invalid"));
    }

    Ok(())
}

fn validate_qos(qos: u8) -> Result<(), ConfigError> {
    if qos <= 2 {
        Ok(())
    } else {
        Err(err("qos", "qos invalid"))
    }
}

/// Validates a raw topic configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if the topic filter is malformed, `qos` is out of
/// range, `multisub_num` is zero while `enable_multisub` is set, or both
/// `enable_share_topic` and `enable_queue_topic` are set (the spec treats
/// the two styles as mutually exclusive; see DESIGN.md).
pub fn validate_topic(raw: &RawTopicConfig) -> Result<TopicConfig, ConfigError> {
    validate_topic_filter(&raw.topic)?;
    validate_qos(raw.qos)?;

    if raw.retain_handling > 2 {
        return Err(err("retain_handling", "retain_handling invalid"));
    }

    if raw.enable_share_topic && raw.enable_queue_topic {
        return Err(err(
            "enable_share_topic",
            "enable_share_topic and enable_queue_topic are mutually exclusive",
        ));
    }

    if raw.enable_multisub && raw.multisub_num < 1 {
        return Err(err("multisub_num", "multisub_num must be >= 1"));
    }

    let style = if raw.enable_share_topic {
        if raw.share_topic_groups.is_empty() {
            return Err(err(
                "share_topic_groups",
                "share_topic_groups required when enable_share_topic is set",
            ));
        }
        SubscriptionStyle::Shared(ShareGroups::new(raw.share_topic_groups.iter().cloned()))
    } else if raw.enable_queue_topic {
        SubscriptionStyle::Queue
    } else {
        SubscriptionStyle::Plain
    };

    Ok(TopicConfig {
        topic: raw.topic.clone(),
        qos: raw.qos,
        no_local: raw.no_local,
        retain_as_published: raw.retain_as_published,
        retain_handling: raw.retain_handling,
        style,
        enable_multisub: raw.enable_multisub,
        multisub_num: raw.multisub_num.max(1),
        auto_subscribe: raw.auto_subscribe,
        handler_class: raw.handler_class.clone(),
    })
}

/// Validates an MQTT topic filter.
///
/// `+` may only appear as a whole level; `#` may only appear as the final
/// level. Control characters are rejected outright.
fn validate_topic_filter(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(err("topic", "topic filter invalid"));
    }

    if topic.chars().any(|c| c.is_control()) {
        return Err(err("topic", "topic filter invalid"));
    }

    let levels: Vec<&str> = topic.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let is_last = i == levels.len() - 1;

        if level.contains('#') && *level != "#" {
            return Err(err("topic", "topic filter invalid"));
        }
        if *level == "#" && !is_last {
            return Err(err("topic", "topic filter invalid"));
        }
        if level.contains('+') && *level != "+" {
            return Err(err("topic", "topic filter invalid"));
        }
    }

    Ok(())
}

/// Validates a raw pool-sizing configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] if `min_connections > max_connections`.
pub fn validate_pool(raw: &RawPoolConfig) -> Result<PoolConfig, ConfigError> {
    if raw.min_connections > raw.max_connections {
        return Err(err("min_connections", "pool sizes invalid"));
    }

    Ok(PoolConfig {
        min_connections: raw.min_connections,
        max_connections: raw.max_connections,
        connect_timeout_s: raw.connect_timeout_s,
        wait_timeout_s: raw.wait_timeout_s,
        heartbeat_s: raw.heartbeat_s,
        max_idle_time_s: raw.max_idle_time_s,
    })
}

/// Strips ASCII control characters from a topic name and trims leading and
/// trailing `/` separators. Idempotent: applying it twice yields the same
/// result as applying it once.
#[must_use]
pub fn sanitize_topic_name(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| !c.is_control()).collect();
    stripped.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_client() -> RawClientConfig {
        RawClientConfig {
            host: "broker.local".to_string(),
            port: 1883,
            client_id: "client-1".to_string(),
            username: None,
            password: None,
            keep_alive: 60,
            protocol_level: 5,
            clean_session: true,
            will: None,
        }
    }

    #[test]
    fn valid_connection_passes() {
        assert!(validate_connection(&valid_client()).is_ok());
    }

    #[test]
    fn rejects_empty_host() {
        let mut raw = valid_client();
        raw.host.clear();
        let err = validate_connection(&raw).unwrap_err();
        assert_eq!(err.field, "host");
        assert_eq!(err.reason, "host required");
    }

    #[test]
    fn rejects_port_zero() {
        let mut raw = valid_client();
        raw.port = 0;
        assert_eq!(validate_connection(&raw).unwrap_err().reason, "port out of range");
    }

    #[test]
    fn rejects_port_too_large() {
        let mut raw = valid_client();
        raw.port = 65536;
        assert_eq!(validate_connection(&raw).unwrap_err().reason, "port out of range");
    }

    #[test]
    fn rejects_empty_client_id() {
        let mut raw = valid_client();
        raw.client_id.clear();
        assert_eq!(validate_connection(&raw).unwrap_err().reason, "client_id invalid");
    }

    #[test]
    fn rejects_client_id_too_long_for_v3() {
        let mut raw = valid_client();
        raw.protocol_level = 3;
        raw.client_id = "a".repeat(24);
        assert_eq!(validate_connection(&raw).unwrap_err().reason, "client_id invalid");
    }

    #[test]
    fn accepts_long_client_id_for_v5() {
        let mut raw = valid_client();
        raw.protocol_level = 5;
        raw.client_id = "a".repeat(100);
        assert!(validate_connection(&raw).is_ok());
    }

    #[test]
    fn rejects_client_id_with_bad_chars() {
        let mut raw = valid_client();
        raw.client_id = "client/1".to_string();
        assert_eq!(validate_connection(&raw).unwrap_err().reason, "client_id invalid");
    }

    #[test]
    fn rejects_invalid_protocol_level() {
        let mut raw = valid_client();
        raw.protocol_level = 6;
        assert_eq!(
            validate_connection(&raw).unwrap_err().reason,
            "protocol_level invalid"
        );
    }

    #[test]
    fn rejects_keep_alive_out_of_range() {
        let mut raw = valid_client();
        raw.keep_alive = 70_000;
        assert_eq!(
            validate_connection(&raw).unwrap_err().reason,
            "keep_alive out of range"
        );
    }

    fn valid_topic() -> RawTopicConfig {
        RawTopicConfig {
            topic: "sensors/+/temperature/#".to_string(),
            qos: 1,
            multisub_num: 1,
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_wildcard_filter() {
        assert!(validate_topic(&valid_topic()).is_ok());
    }

    #[test]
    fn rejects_plus_not_whole_level() {
        let mut raw = valid_topic();
        raw.topic = "sensors/temp+/data".to_string();
        assert_eq!(validate_topic(&raw).unwrap_err().reason, "topic filter invalid");
    }

    #[test]
    fn rejects_hash_not_final_level() {
        let mut raw = valid_topic();
        raw.topic = "a/#/b".to_string();
        assert_eq!(validate_topic(&raw).unwrap_err().reason, "topic filter invalid");
    }

    #[test]
    fn rejects_control_characters() {
        let mut raw = valid_topic();
        raw.topic = "\x01/c".to_string();
        assert_eq!(validate_topic(&raw).unwrap_err().reason, "topic filter invalid");
    }

    #[test]
    fn rejects_qos_out_of_range() {
        let mut raw = valid_topic();
        raw.qos = 3;
        assert_eq!(validate_topic(&raw).unwrap_err().reason, "qos invalid");
    }

    #[test]
    fn rejects_both_share_and_queue() {
        let mut raw = valid_topic();
        raw.enable_share_topic = true;
        raw.share_topic_groups = vec!["a".to_string()];
        raw.enable_queue_topic = true;
        assert!(validate_topic(&raw).is_err());
    }

    #[test]
    fn rejects_multisub_zero() {
        let mut raw = valid_topic();
        raw.enable_multisub = true;
        raw.multisub_num = 0;
        assert_eq!(validate_topic(&raw).unwrap_err().reason, "multisub_num must be >= 1");
    }

    #[test]
    fn shared_style_requires_groups() {
        let mut raw = valid_topic();
        raw.enable_share_topic = true;
        raw.share_topic_groups = vec![];
        assert!(validate_topic(&raw).is_err());
    }

    #[test]
    fn valid_pool_sizes_pass() {
        let raw = RawPoolConfig {
            min_connections: 1,
            max_connections: 5,
            ..RawPoolConfig::default()
        };
        assert!(validate_pool(&raw).is_ok());
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let raw = RawPoolConfig {
            min_connections: 5,
            max_connections: 3,
            ..RawPoolConfig::default()
        };
        assert_eq!(validate_pool(&raw).unwrap_err().reason, "pool sizes invalid");
    }

    #[test]
    fn sanitize_strips_control_chars_and_trims_slashes() {
        assert_eq!(sanitize_topic_name("/sensors/temp\x01/"), "sensors/temp");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize_topic_name("/a/b/");
        let twice = sanitize_topic_name(&once);
        assert_eq!(once, twice);
    }
}
