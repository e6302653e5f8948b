// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loads the host configuration document (§6) and applies environment
//! overrides before validation.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::types::{DebugConfig, RawClientConfig, RawPoolConfig, RawTopicConfig};
use crate::error::ConfigError;

/// One named broker profile in the configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerProfile {
    #[serde(flatten)]
    pub connection: RawClientConfig,
    #[serde(default)]
    pub pool: RawPoolConfig,
    #[serde(default)]
    pub topics: Vec<RawTopicConfig>,
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Top-level configuration document: one profile per pool name.
///
/// Most deployments have a single profile named `default`, matching
/// `spec.md` §4.3's note that most deployments have exactly one pool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootConfig {
    #[serde(flatten)]
    pub profiles: HashMap<String, BrokerProfile>,
}

impl RootConfig {
    /// Returns the named profile, if present.
    #[must_use]
    pub fn profile(&self, pool_name: &str) -> Option<&BrokerProfile> {
        self.profiles.get(pool_name)
    }
}

/// Loads a [`RootConfig`] from a TOML file at `path`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<RootConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new("config_file", format!("cannot read {}: {e}", path.display())))?;
    toml::from_str(&text).map_err(|e| ConfigError::new("config_file", format!("parse error: {e}")))
}

/// Environment variable names recognized as top-level overrides (§6).
const ENV_HOST: &str = "MQTT_HOST";
const ENV_PORT: &str = "MQTT_PORT";
const ENV_USERNAME: &str = "MQTT_USERNAME";
const ENV_PASSWORD: &str = "MQTT_PASSWORD";
const ENV_PROTOCOL_LEVEL: &str = "MQTT_PROTOCOL_LEVEL";

/// Applies `MQTT_HOST`/`MQTT_PORT`/`MQTT_USERNAME`/`MQTT_PASSWORD`/
/// `MQTT_PROTOCOL_LEVEL` overrides to a profile's connection fields,
/// reading them through `env_lookup` so callers can inject a fake
/// environment in tests.
pub fn load_with_env_overrides(
    mut profile: BrokerProfile,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> BrokerProfile {
    if let Some(host) = env_lookup(ENV_HOST) {
        profile.connection.host = host;
    }
    if let Some(port) = env_lookup(ENV_PORT).and_then(|v| v.parse().ok()) {
        profile.connection.port = port;
    }
    if let Some(username) = env_lookup(ENV_USERNAME) {
        profile.connection.username = Some(username);
    }
    if let Some(password) = env_lookup(ENV_PASSWORD) {
        profile.connection.password = Some(password);
    }
    if let Some(level) = env_lookup(ENV_PROTOCOL_LEVEL).and_then(|v| v.parse().ok()) {
        profile.connection.protocol_level = level;
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply_named_vars_only() {
        let profile = BrokerProfile {
            connection: RawClientConfig {
                host: "original".to_string(),
                port: 1883,
                ..Default::default()
            },
            ..Default::default()
        };

        let overridden = load_with_env_overrides(profile, |key| match key {
            "MQTT_HOST" => Some("overridden.example".to_string()),
            "MQTT_PORT" => Some("8883".to_string()),
            _ => None,
        });

        assert_eq!(overridden.connection.host, "overridden.example");
        assert_eq!(overridden.connection.port, 8883);
    }

    #[test]
    fn missing_env_vars_leave_document_values() {
        let profile = BrokerProfile {
            connection: RawClientConfig {
                host: "keep-me".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let overridden = load_with_env_overrides(profile, |_| None);
        assert_eq!(overridden.connection.host, "keep-me");
    }

    #[test]
    fn root_config_parses_toml_document() {
        let doc = r#"
            [default]
            host = "broker.local"
            port = 1883
            client_id = "app-1"

            [default.pool]
            min_connections = 1
            max_connections = 5

            [[default.topics]]
            topic = "jobs/work"
            qos = 1
            auto_subscribe = true
        "#;

        let root: RootConfig = toml::from_str(doc).unwrap();
        let profile = root.profile("default").unwrap();
        assert_eq!(profile.connection.host, "broker.local");
        assert_eq!(profile.pool.max_connections, 5);
        assert_eq!(profile.topics.len(), 1);
        assert!(profile.topics[0].auto_subscribe);
    }

    #[test]
    fn missing_profile_returns_none() {
        let root = RootConfig::default();
        assert!(root.profile("default").is_none());
    }
}
