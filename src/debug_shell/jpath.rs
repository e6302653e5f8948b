// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dotted-path JSON evaluator (§4.11.6): `$.a.b[0].c`, `$.items[*].value`.
//!
//! Hand-rolled rather than pulled from a crate: the grammar is a handful
//! of cases over `serde_json::Value` and the teacher pack has no existing
//! JSON-path dependency to ground one on.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// Splits `$.a.b[0].c` / `$.items[*].value` into path segments.
fn parse_path(path: &str) -> Vec<Segment> {
    let path = path.strip_prefix("$.").or_else(|| path.strip_prefix('$')).unwrap_or(path);
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            continue;
        }
        let mut rest = part;
        if let Some(dot) = rest.find('[') {
            let field = &rest[..dot];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }
            rest = &rest[dot..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let Some(end) = stripped.find(']') else { break };
                let index_str = &stripped[..end];
                segments.push(if index_str == "*" {
                    Segment::Wildcard
                } else if let Ok(index) = index_str.parse::<usize>() {
                    Segment::Index(index)
                } else {
                    Segment::Field(index_str.to_string())
                });
                rest = &stripped[end + 1..];
            }
        } else {
            segments.push(Segment::Field(rest.to_string()));
        }
    }
    segments
}

/// Evaluates `path` against `value`, returning every matching leaf. A
/// `[*]` wildcard fans out across an array, collecting one result per
/// element that resolves the remaining path.
#[must_use]
pub fn evaluate<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments = parse_path(path);
    let mut current = vec![value];
    for segment in segments {
        let mut next = Vec::new();
        for item in current {
            match (&segment, item) {
                (Segment::Field(name), Value::Object(map)) => {
                    if let Some(v) = map.get(name) {
                        next.push(v);
                    }
                }
                (Segment::Index(i), Value::Array(arr)) => {
                    if let Some(v) = arr.get(*i) {
                        next.push(v);
                    }
                }
                (Segment::Wildcard, Value::Array(arr)) => {
                    next.extend(arr.iter());
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}
