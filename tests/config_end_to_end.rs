// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end configuration loading: a TOML document on disk, environment
//! overrides, then validation into the immutable config types the rest of
//! the crate consumes.

use mqtt_pool_lib::config::{load_from_file, load_with_env_overrides, validate_connection, validate_pool, validate_topic};

#[test]
fn document_on_disk_loads_overrides_and_validates() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("mqtt_pool_lib-test-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
            [default]
            host = "broker.local"
            port = 1883
            client_id = "app-1"
            keep_alive = 30

            [default.pool]
            min_connections = 1
            max_connections = 4
            wait_timeout_s = 2

            [[default.topics]]
            topic = "sensors/+/temperature"
            qos = 1
            auto_subscribe = true
        "#,
    )
    .unwrap();

    let root = load_from_file(&path).unwrap();
    let profile = root.profile("default").unwrap().clone();
    let _ = std::fs::remove_file(&path);

    let overridden = load_with_env_overrides(profile, |key| match key {
        "MQTT_PORT" => Some("8883".to_string()),
        _ => None,
    });

    let client_config = validate_connection(&overridden.connection).unwrap();
    assert_eq!(client_config.host(), "broker.local");
    assert_eq!(client_config.port(), 8883);

    let pool_config = validate_pool(&overridden.pool).unwrap();
    assert_eq!(pool_config.max_connections(), 4);

    assert_eq!(overridden.topics.len(), 1);
    let topic_config = validate_topic(&overridden.topics[0]).unwrap();
    assert!(topic_config.auto_subscribe());
    assert_eq!(topic_config.topic(), "sensors/+/temperature");
}

#[test]
fn malformed_document_surfaces_config_error() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("mqtt_pool_lib-test-bad-config-{}.toml", std::process::id()));
    std::fs::write(&path, "not = [valid toml").unwrap();

    let result = load_from_file(&path);
    let _ = std::fs::remove_file(&path);

    assert!(result.is_err());
}
