// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug Message wire shape (§3, §6): newline-delimited JSON records
//! broadcast to attached debug clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{MqttEvent, OperationResult};

/// One server-to-client Debug Tap record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugMessage {
    /// Record kind: `"publish"`, `"subscribe"`, `"disconnect"`, `"system"`,
    /// or `"response"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific body.
    pub payload: Value,
    /// Opaque provenance tag, e.g. `"mqtt:<topic>"` or `"system"`.
    pub source: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-form key/value metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl DebugMessage {
    /// Builds the single greeting sent to every newly accepted client.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            kind: "system".to_string(),
            payload: Value::String(text.into()),
            source: "system".to_string(),
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Builds a `response` record from a host command callback's result.
    #[must_use]
    pub fn response(command: &str, success: bool, message: Option<String>, data: Value) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("command".to_string(), Value::String(command.to_string()));
        metadata.insert("success".to_string(), Value::Bool(success));
        if let Some(message) = message {
            metadata.insert("message".to_string(), Value::String(message));
        }
        Self {
            kind: "response".to_string(),
            payload: data,
            source: "system".to_string(),
            timestamp: Utc::now(),
            metadata,
        }
    }

    /// Converts a bus [`MqttEvent`] into its Debug Message form, when the
    /// event is one the tap forwards. `OnReceive`/`Publish`/`Subscribe`
    /// requests are forwarded; `OnPublish`/`OnSubscribe` acknowledgements
    /// fold into the same `"publish"`/`"subscribe"` record kinds so shell
    /// users see one line per operation regardless of which side of the
    /// ack it observed.
    #[must_use]
    pub fn from_event(event: &MqttEvent) -> Option<Self> {
        let now = Utc::now();
        match event {
            MqttEvent::OnReceive(received) => Some(Self {
                kind: "publish".to_string(),
                payload: serde_json::json!({
                    "topic": received.topic,
                    "message": String::from_utf8_lossy(&received.message),
                    "qos": received.qos,
                    "pool": received.pool_name,
                }),
                source: format!("mqtt:{}", received.topic),
                timestamp: now,
                metadata: serde_json::Map::new(),
            }),
            MqttEvent::OnPublish(published) => Some(Self {
                kind: "publish".to_string(),
                payload: serde_json::json!({
                    "topic": published.topic,
                    "message": String::from_utf8_lossy(&published.message),
                    "qos": published.qos,
                    "pool": published.pool_name,
                }),
                source: format!("mqtt:{}", published.topic),
                timestamp: now,
                metadata: outcome_metadata(&published.result),
            }),
            MqttEvent::OnSubscribe(subscribed) => Some(Self {
                kind: "subscribe".to_string(),
                payload: serde_json::json!({
                    "topics": subscribed.topics,
                    "client_id": subscribed.client_id,
                    "pool": subscribed.pool_name,
                }),
                source: "mqtt:subscribe".to_string(),
                timestamp: now,
                metadata: outcome_metadata(&subscribed.result),
            }),
            MqttEvent::OnDisconnect(disconnect) => Some(Self {
                kind: "disconnect".to_string(),
                payload: serde_json::json!({
                    "disconnect_type": matches!(disconnect.disconnect_type, crate::event::DisconnectType::Error) as u8,
                    "code": disconnect.code,
                    "pool": disconnect.pool_name,
                }),
                source: "mqtt:disconnect".to_string(),
                timestamp: now,
                metadata: serde_json::Map::new(),
            }),
            MqttEvent::Publish(_) | MqttEvent::Subscribe(_) => None,
        }
    }
}

fn outcome_metadata(result: &OperationResult) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("success".to_string(), Value::Bool(result.is_success()));
    metadata
}

/// One client-to-server Debug Tap command (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Liveness probe; server replies `pong`.
    Ping,
    /// Informational toggle; the server keeps streaming regardless.
    Subscribe,
    /// Informational toggle; the server keeps streaming regardless.
    Unsubscribe,
    /// A named command, either handled locally (`stats`) or delegated to
    /// the host callback.
    Command {
        /// Command name.
        command: String,
        /// Arbitrary command arguments.
        #[serde(flatten)]
        args: serde_json::Map<String, Value>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_has_system_source() {
        let message = DebugMessage::system("hello");
        assert_eq!(message.kind, "system");
        assert_eq!(message.source, "system");
    }

    #[test]
    fn ping_command_parses() {
        let command: ClientCommand = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(command, ClientCommand::Ping));
    }

    #[test]
    fn named_command_parses_with_args() {
        let command: ClientCommand =
            serde_json::from_str(r#"{"type":"command","command":"stats","limit":10}"#).unwrap();
        match command {
            ClientCommand::Command { command, args } => {
                assert_eq!(command, "stats");
                assert_eq!(args.get("limit").and_then(Value::as_i64), Some(10));
            }
            _ => panic!("expected Command variant"),
        }
    }

    #[test]
    fn response_message_carries_command_metadata() {
        let message = DebugMessage::response("stats", true, None, serde_json::json!({"count": 1}));
        assert_eq!(message.metadata.get("command").unwrap(), "stats");
        assert_eq!(message.metadata.get("success").unwrap(), true);
    }
}
