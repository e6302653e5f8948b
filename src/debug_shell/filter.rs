// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filter grammar (§4.11.1): `where <condition>` expressions over
//! history entries, used both for display filtering and breakpoints.
//!
//! Grounded on the teacher pack's `nom`-based decoders (e.g.
//! `flier-rust-mqtt/mqtt-core/src/decode.rs`), adapted from binary packet
//! grammars to a small text expression grammar using `nom::character`'s
//! text combinators instead of the teacher's byte-oriented ones.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, tag_no_case, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{map, opt, recognize};
use nom::multi::many0;
use nom::number::complete::double;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use super::history::{Direction, HistoryEntry};
use crate::error::FilterParseError;

/// A field a filter term can reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Topic,
    Direction,
    Qos,
    Type,
    Source,
    Metadata(String),
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// A literal value on the right-hand side of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
}

/// One `field op value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub field: Field,
    pub op: Op,
    pub value: Value,
}

/// A filter expression: terms combined with `and`/`or`, `and` binding
/// tighter than `or` (§4.11.1).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Term(Term),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    /// Evaluates this expression against `entry`.
    #[must_use]
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        match self {
            Self::Term(term) => term.matches(entry),
            Self::And(lhs, rhs) => lhs.matches(entry) && rhs.matches(entry),
            Self::Or(lhs, rhs) => lhs.matches(entry) || rhs.matches(entry),
        }
    }

    /// Renders this expression back into `where`-clause syntax. Applying
    /// [`parse`] to this output reproduces an equal AST.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Term(term) => term.render(),
            Self::And(lhs, rhs) => format!("{} and {}", lhs.render(), rhs.render()),
            // Parenthesize the whole clause, not just its operands: an `Or`
            // nested under an `And` needs its own parens or the rendered
            // text re-parses with the wrong precedence.
            Self::Or(lhs, rhs) => format!("({} or {})", lhs.render(), rhs.render()),
        }
    }
}

impl Term {
    fn matches(&self, entry: &HistoryEntry) -> bool {
        match &self.field {
            Field::Topic => self.compare_str(entry.topic().unwrap_or("")),
            Field::Direction => {
                let direction = match entry.direction {
                    Direction::Inbound => "inbound",
                    Direction::Outbound => "outbound",
                };
                self.compare_str(direction)
            }
            Field::Type => self.compare_str(&entry.message.kind),
            Field::Source => self.compare_str(&entry.message.source),
            Field::Qos => entry.qos().is_some_and(|qos| self.compare_num(f64::from(qos))),
            Field::Metadata(key) => entry
                .message
                .metadata
                .get(key)
                .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
                .is_some_and(|s| self.compare_str(&s)),
        }
    }

    fn compare_str(&self, actual: &str) -> bool {
        match (&self.value, self.op) {
            (Value::Str(expected), Op::Eq) => actual == expected,
            (Value::Str(expected), Op::Ne) => actual != expected,
            (Value::Str(pattern), Op::Like) => like_matches(pattern, actual),
            _ => false,
        }
    }

    fn compare_num(&self, actual: f64) -> bool {
        let Value::Num(expected) = self.value else { return false };
        match self.op {
            Op::Eq => (actual - expected).abs() < f64::EPSILON,
            Op::Ne => (actual - expected).abs() >= f64::EPSILON,
            Op::Lt => actual < expected,
            Op::Le => actual <= expected,
            Op::Gt => actual > expected,
            Op::Ge => actual >= expected,
            Op::Like => false,
        }
    }

    fn render(&self) -> String {
        let field = match &self.field {
            Field::Topic => "topic".to_string(),
            Field::Direction => "direction".to_string(),
            Field::Qos => "qos".to_string(),
            Field::Type => "type".to_string(),
            Field::Source => "source".to_string(),
            Field::Metadata(key) => format!("metadata.{key}"),
        };
        let op = match self.op {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "like",
        };
        let value = match &self.value {
            Value::Str(s) => format!("'{s}'"),
            Value::Num(n) => n.to_string(),
        };
        format!("{field} {op} {value}")
    }
}

/// `topic/+/#`-style MQTT wildcards are matched with `filter_matches`
/// (topic semantics); `like` on non-topic fields is interpreted as
/// MQTT-style `+`/`#` wildcards over `/`-free strings, which reduces to a
/// simple case-sensitive substring style match on `*`-delimited segments.
fn like_matches(pattern: &str, actual: &str) -> bool {
    if pattern.contains('+') || pattern.contains('#') {
        crate::topic::filter_matches(pattern, actual)
    } else {
        actual.contains(pattern)
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '.')(input)
}

fn field(input: &str) -> IResult<&str, Field> {
    map(identifier, |s: &str| {
        if let Some(key) = s.strip_prefix("metadata.") {
            Field::Metadata(key.to_string())
        } else {
            match s {
                "topic" => Field::Topic,
                "direction" => Field::Direction,
                "qos" => Field::Qos,
                "type" => Field::Type,
                "source" => Field::Source,
                other => Field::Metadata(other.to_string()),
            }
        }
    })(input)
}

fn op(input: &str) -> IResult<&str, Op> {
    alt((
        map(tag("!="), |_| Op::Ne),
        map(tag("<="), |_| Op::Le),
        map(tag(">="), |_| Op::Ge),
        map(tag("="), |_| Op::Eq),
        map(tag("<"), |_| Op::Lt),
        map(tag(">"), |_| Op::Gt),
        map(tag_no_case("like"), |_| Op::Like),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    map(delimited(char('\''), opt(is_not("'")), char('\'')), |s: Option<&str>| s.unwrap_or("").to_string())(input)
}

fn value(input: &str) -> IResult<&str, Value> {
    alt((map(quoted_string, Value::Str), map(double, Value::Num)))(input)
}

fn term(input: &str) -> IResult<&str, FilterExpr> {
    map(tuple((ws(field), ws(op), ws(value))), |(field, op, value)| FilterExpr::Term(Term { field, op, value }))(input)
}

fn primary(input: &str) -> IResult<&str, FilterExpr> {
    alt((delimited(ws(char('(')), condition, ws(char(')'))), term))(input)
}

fn and_chain(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(preceded(ws(tag_no_case("and")), primary))(input)?;
    Ok((input, rest.into_iter().fold(first, |lhs, rhs| FilterExpr::And(Box::new(lhs), Box::new(rhs)))))
}

fn condition(input: &str) -> IResult<&str, FilterExpr> {
    let (input, first) = and_chain(input)?;
    let (input, rest) = many0(preceded(ws(tag_no_case("or")), and_chain))(input)?;
    Ok((input, rest.into_iter().fold(first, |lhs, rhs| FilterExpr::Or(Box::new(lhs), Box::new(rhs)))))
}

/// Parses a full `where <condition>` clause (the leading `where` keyword
/// is optional; callers may pass either the whole clause or just the
/// condition).
///
/// # Errors
///
/// Returns [`FilterParseError`] describing where parsing failed.
pub fn parse(input: &str) -> Result<FilterExpr, FilterParseError> {
    let trimmed = input.trim();
    let stripped = trimmed.strip_prefix("where").map_or(trimmed, str::trim_start);
    let (remaining, expr) = condition(stripped).map_err(|e| FilterParseError(e.to_string()))?;
    if !remaining.trim().is_empty() {
        return Err(FilterParseError(format!("unexpected trailing input: {remaining}")));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_tap::DebugMessage;

    fn entry(id: u64, topic: &str, qos: u8) -> HistoryEntry {
        HistoryEntry {
            id,
            message: DebugMessage {
                kind: "publish".to_string(),
                payload: serde_json::json!({ "topic": topic, "qos": qos }),
                source: format!("mqtt:{topic}"),
                timestamp: chrono::Utc::now(),
                metadata: serde_json::Map::new(),
            },
            direction: Direction::Inbound,
        }
    }

    #[test]
    fn scenario_s3_topic_like_and_qos_filters() {
        // "where topic like 'sensors/+/temperature' and qos >= 1" over a
        // 3-message stream should display only the matching message.
        let expr = parse("where topic like 'sensors/+/temperature' and qos >= 1").unwrap();
        let messages = vec![
            entry(1, "sensors/room1/humidity", 1),
            entry(2, "sensors/room1/temperature", 1),
            entry(3, "sensors/room1/temperature", 0),
        ];
        let displayed: Vec<u64> = messages.iter().filter(|e| expr.matches(e)).map(|e| e.id).collect();
        assert_eq!(displayed, vec![2]);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("topic = 'a' or topic = 'b' and qos = 1").unwrap();
        // Equivalent to: topic = 'a' or (topic = 'b' and qos = 1)
        assert!(expr.matches(&entry(1, "a", 0)));
        assert!(!expr.matches(&entry(1, "b", 0)));
        assert!(expr.matches(&entry(1, "b", 1)));
    }

    #[test]
    fn parenthesised_or_overrides_precedence() {
        let expr = parse("(topic = 'a' or topic = 'b') and qos = 1").unwrap();
        assert!(!expr.matches(&entry(1, "a", 0)));
        assert!(expr.matches(&entry(1, "a", 1)));
        assert!(expr.matches(&entry(1, "b", 1)));
    }

    #[test]
    fn render_then_parse_round_trips() {
        let expr = parse("topic = 'a' and qos >= 1").unwrap();
        let rendered = expr.render();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn render_then_parse_round_trips_nested_or_under_and() {
        let expr = parse("(topic = 'a' or topic = 'b') and qos = 1").unwrap();
        let rendered = expr.render();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(expr, reparsed);
    }

    #[test]
    fn metadata_field_parses_and_matches() {
        let expr = parse("metadata.success = 'true'").unwrap();
        let mut entry = entry(1, "a", 0);
        entry.message.metadata.insert("success".to_string(), serde_json::Value::String("true".to_string()));
        assert!(expr.matches(&entry));
    }
}
