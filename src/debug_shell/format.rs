// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display formatters (§4.11.5): compact/table/vertical/json/hex, all
//! tolerant of non-UTF-8 payload bytes.

use serde_json::Value;

use super::history::{Direction, HistoryEntry};

const COMPACT_PAYLOAD_LIMIT: usize = 80;

/// Which formatter to render a [`HistoryEntry`] with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// One line per message: `#id dir topic qos payload…`.
    Compact,
    /// Aligned columns.
    Table,
    /// One field per line.
    Vertical,
    /// Pretty-printed JSON of the whole record.
    Json {
        /// Maximum nesting depth to render before truncating with `…`;
        /// `None` means unlimited.
        depth_limit: Option<usize>,
        /// Render only field names and types, not values.
        schema_mode: bool,
    },
    /// Hex dump of the raw payload bytes.
    Hex,
}

fn payload_text(entry: &HistoryEntry) -> String {
    entry.message.payload.get("message").and_then(Value::as_str).map_or_else(
        || entry.message.payload.to_string(),
        ToString::to_string,
    )
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(limit).collect();
        format!("{truncated}…")
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Inbound => "in",
        Direction::Outbound => "out",
    }
}

/// Renders `entry` with `formatter`.
#[must_use]
pub fn render(entry: &HistoryEntry, formatter: Formatter) -> String {
    match formatter {
        Formatter::Compact => render_compact(entry),
        Formatter::Table => render_table(entry),
        Formatter::Vertical => render_vertical(entry),
        Formatter::Json { depth_limit, schema_mode } => render_json(entry, depth_limit, schema_mode),
        Formatter::Hex => render_hex(entry),
    }
}

fn render_compact(entry: &HistoryEntry) -> String {
    format!(
        "#{} {} {} {} {}",
        entry.id,
        direction_label(entry.direction),
        entry.topic().unwrap_or("-"),
        entry.qos().map_or_else(|| "-".to_string(), |q| q.to_string()),
        truncate(&payload_text(entry), COMPACT_PAYLOAD_LIMIT)
    )
}

fn render_table(entry: &HistoryEntry) -> String {
    format!(
        "{:<6} {:<4} {:<3} {:<10} {:<30} {}",
        entry.id,
        direction_label(entry.direction),
        entry.qos().map_or_else(|| "-".to_string(), |q| q.to_string()),
        entry.message.kind,
        entry.topic().unwrap_or("-"),
        truncate(&payload_text(entry), 40)
    )
}

fn render_vertical(entry: &HistoryEntry) -> String {
    let mut lines = vec![
        format!("id: {}", entry.id),
        format!("direction: {}", direction_label(entry.direction)),
        format!("type: {}", entry.message.kind),
        format!("source: {}", entry.message.source),
        format!("timestamp: {}", entry.message.timestamp),
    ];
    if let Some(topic) = entry.topic() {
        lines.push(format!("topic: {topic}"));
    }
    if let Some(qos) = entry.qos() {
        lines.push(format!("qos: {qos}"));
    }
    lines.push(format!("payload: {}", payload_text(entry)));
    for (key, value) in &entry.message.metadata {
        lines.push(format!("metadata.{key}: {value}"));
    }
    lines.join("\n")
}

fn truncate_json(value: &Value, depth_limit: Option<usize>, depth: usize) -> Value {
    let Some(limit) = depth_limit else { return value.clone() };
    if depth >= limit {
        return match value {
            Value::Object(_) | Value::Array(_) => Value::String("…".to_string()),
            other => other.clone(),
        };
    }
    match value {
        Value::Object(map) => {
            Value::Object(map.iter().map(|(k, v)| (k.clone(), truncate_json(v, depth_limit, depth + 1))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| truncate_json(v, depth_limit, depth + 1)).collect()),
        other => other.clone(),
    }
}

fn schema_of(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), schema_of(v))).collect()),
        Value::Array(items) => {
            Value::Array(items.first().map_or_else(Vec::new, |v| vec![schema_of(v)]))
        }
        Value::String(_) => Value::String("string".to_string()),
        Value::Number(n) if n.is_f64() => Value::String("number".to_string()),
        Value::Number(_) => Value::String("integer".to_string()),
        Value::Bool(_) => Value::String("bool".to_string()),
        Value::Null => Value::String("null".to_string()),
    }
}

fn render_json(entry: &HistoryEntry, depth_limit: Option<usize>, schema_mode: bool) -> String {
    let record = serde_json::json!({
        "id": entry.id,
        "direction": direction_label(entry.direction),
        "message": entry.message,
    });
    let shaped = if schema_mode { schema_of(&record) } else { truncate_json(&record, depth_limit, 0) };
    serde_json::to_string_pretty(&shaped).unwrap_or_default()
}

fn render_hex(entry: &HistoryEntry) -> String {
    let bytes = entry.message.payload.get("message").and_then(Value::as_str).map_or_else(Vec::new, |s| s.as_bytes().to_vec());
    let mut lines = Vec::new();
    for chunk in bytes.chunks(16) {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String =
            chunk.iter().map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' }).collect();
        lines.push(format!("{:<47} {}", hex.join(" "), ascii));
    }
    if lines.is_empty() { "(empty)".to_string() } else { lines.join("\n") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_tap::DebugMessage;

    fn entry() -> HistoryEntry {
        HistoryEntry {
            id: 7,
            message: DebugMessage {
                kind: "publish".to_string(),
                payload: serde_json::json!({ "topic": "sensors/temp", "qos": 1, "message": "23.5" }),
                source: "mqtt:sensors/temp".to_string(),
                timestamp: chrono::Utc::now(),
                metadata: serde_json::Map::new(),
            },
            direction: Direction::Inbound,
        }
    }

    #[test]
    fn compact_truncates_long_payload() {
        let mut long_entry = entry();
        long_entry.message.payload = serde_json::json!({ "message": "x".repeat(200) });
        let rendered = render(&long_entry, Formatter::Compact);
        assert!(rendered.contains('…'));
    }

    #[test]
    fn compact_includes_topic_and_qos() {
        let rendered = render(&entry(), Formatter::Compact);
        assert!(rendered.contains("sensors/temp"));
        assert!(rendered.contains('1'));
    }

    #[test]
    fn hex_formatter_handles_non_utf8_safe_bytes() {
        let rendered = render(&entry(), Formatter::Hex);
        assert!(rendered.contains("32 33 2e 35"));
    }

    #[test]
    fn json_schema_mode_reports_types_not_values() {
        let rendered = render(&entry(), Formatter::Json { depth_limit: None, schema_mode: true });
        assert!(rendered.contains("\"string\""));
        assert!(!rendered.contains("sensors/temp"));
    }

    #[test]
    fn vertical_lists_one_field_per_line() {
        let rendered = render(&entry(), Formatter::Vertical);
        assert!(rendered.lines().count() >= 5);
    }
}
