// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Export (§4.11.8): pretty JSON and hand-rolled CSV dumps of history
//! entries, both honoring a `--limit` on entry count.

use super::history::{Direction, History, HistoryEntry};

/// Serializes the most recent `limit` entries (or all, if `limit` is
/// `None`) as a pretty-printed JSON array.
#[must_use]
pub fn to_json(history: &History, limit: Option<usize>) -> String {
    let entries: Vec<&HistoryEntry> = match limit {
        Some(limit) => history.range(limit),
        None => history.iter().collect(),
    };
    let records: Vec<_> = entries
        .iter()
        .map(|e| serde_json::json!({ "id": e.id, "direction": direction_str(e.direction), "message": e.message }))
        .collect();
    serde_json::to_string_pretty(&records).unwrap_or_default()
}

const CSV_HEADER: &str = "timestamp,type,source,topic,qos,direction,payload";

/// Serializes the most recent `limit` entries (or all) as CSV with the
/// fixed column order `timestamp,type,source,topic,qos,direction,payload`.
///
/// No CSV crate is pulled in for this: the column set is fixed and small,
/// and RFC 4180 quoting (doubling embedded `"`, quoting any field
/// containing a comma/quote/newline) is a handful of lines to hand-roll.
#[must_use]
pub fn to_csv(history: &History, limit: Option<usize>) -> String {
    let entries: Vec<&HistoryEntry> = match limit {
        Some(limit) => history.range(limit),
        None => history.iter().collect(),
    };
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for entry in entries {
        let payload = entry.message.payload.get("message").and_then(serde_json::Value::as_str).map_or_else(
            || entry.message.payload.to_string(),
            ToString::to_string,
        );
        let fields = [
            entry.message.timestamp.to_rfc3339(),
            entry.message.kind.clone(),
            entry.message.source.clone(),
            entry.topic().unwrap_or_default().to_string(),
            entry.qos().map_or_else(String::new, |q| q.to_string()),
            direction_str(entry.direction).to_string(),
            payload,
        ];
        out.push_str(&fields.iter().map(|f| quote_csv_field(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
    }
    out
}

fn direction_str(direction: Direction) -> &'static str {
    match direction {
        Direction::Inbound => "inbound",
        Direction::Outbound => "outbound",
    }
}

fn quote_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_tap::DebugMessage;

    fn seed(history: &mut History) {
        history.push(
            DebugMessage {
                kind: "publish".to_string(),
                payload: serde_json::json!({ "topic": "a/b", "qos": 1, "message": "hello, \"world\"" }),
                source: "mqtt:a/b".to_string(),
                timestamp: chrono::Utc::now(),
                metadata: serde_json::Map::new(),
            },
            Direction::Inbound,
        );
    }

    #[test]
    fn csv_has_expected_header() {
        let history = History::new(10);
        let csv = to_csv(&history, None);
        assert!(csv.starts_with(CSV_HEADER));
    }

    #[test]
    fn csv_quotes_embedded_comma_and_doubles_quotes() {
        let mut history = History::new(10);
        seed(&mut history);
        let csv = to_csv(&history, None);
        assert!(csv.contains("\"hello, \"\"world\"\"\""));
    }

    #[test]
    fn json_export_respects_limit() {
        let mut history = History::new(10);
        seed(&mut history);
        seed(&mut history);
        seed(&mut history);
        let json = to_json(&history, Some(1));
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
