// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection, error, and validation counters (§4.9).
//!
//! Grounded on the teacher's `AtomicU64` counter idiom
//! (`subscription::callback::CallbackRegistry`'s `next_id`,
//! `protocol::broker_pool::POOL_CLIENT_ID_COUNTER`), generalized into
//! resettable counter groups. No export format is implied: counters are
//! queried in-process only (no `metrics`/`prometheus` crate appears
//! anywhere in the example pack for this domain).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Error taxonomy categories routed to [`ErrorMetrics`] (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// A connection attempt failed.
    Connect,
    /// A connection was closed with a non-normal reason code.
    DisconnectError,
    /// A publish operation failed.
    Publish,
    /// A subscribe operation failed.
    Subscribe,
    /// A configuration or input validation failure.
    Validation,
    /// A codec- or broker-level protocol error.
    Protocol,
}

/// One recorded error occurrence: a running count plus the most recent
/// message and timestamp for that `(category, subject)` pair.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    count: u64,
    last_message: String,
    last_ts: DateTime<Utc>,
}

impl ErrorRecord {
    /// Number of times this `(category, subject)` pair has been recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The most recent failure message.
    #[must_use]
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// When the most recent occurrence was recorded.
    #[must_use]
    pub fn last_ts(&self) -> DateTime<Utc> {
        self.last_ts
    }
}

/// `(category, subject) -> (count, last_message, last_ts)` error taxonomy
/// (§4.9). `subject` is an opaque caller-chosen label: a client id, a pool
/// name, a topic — whatever identifies *what* failed within the category.
#[derive(Debug, Default)]
struct ErrorMetricsInner {
    records: RwLock<HashMap<(ErrorCategory, String), ErrorRecord>>,
}

/// Cheaply cloneable handle onto shared error counters.
#[derive(Debug, Clone)]
pub struct ErrorMetrics {
    inner: Arc<ErrorMetricsInner>,
}

impl ErrorMetrics {
    fn new() -> Self {
        Self {
            inner: Arc::new(ErrorMetricsInner::default()),
        }
    }

    /// Records one occurrence of `category` for `subject`, overwriting the
    /// last message and timestamp.
    pub fn record(&self, category: ErrorCategory, subject: impl Into<String>, message: impl Into<String>) {
        let key = (category, subject.into());
        let mut records = self.inner.records.write();
        let entry = records.entry(key).or_insert_with(|| ErrorRecord {
            count: 0,
            last_message: String::new(),
            last_ts: Utc::now(),
        });
        entry.count += 1;
        entry.last_message = message.into();
        entry.last_ts = Utc::now();
    }

    /// Convenience for the §8 invariant: every abnormal disconnect
    /// increments `ErrorMetrics[disconnect_error]` by exactly one.
    pub fn incr_disconnect_error(&self, client_id: &str, code: u8) {
        self.record(ErrorCategory::DisconnectError, client_id, format!("reason code {code:#04x}"));
    }

    /// Total count across all subjects within `category`.
    #[must_use]
    pub fn total_for_category(&self, category: ErrorCategory) -> u64 {
        self.inner
            .records
            .read()
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|(_, record)| record.count)
            .sum()
    }

    /// Count recorded for one `(category, subject)` pair.
    #[must_use]
    pub fn count_for(&self, category: ErrorCategory, subject: &str) -> u64 {
        self.inner
            .records
            .read()
            .get(&(category, subject.to_string()))
            .map_or(0, ErrorRecord::count)
    }

    /// Clears every counter.
    pub fn reset(&self) {
        self.inner.records.write().clear();
    }
}

impl Default for ErrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection lifecycle counters (§4.9).
#[derive(Debug, Default)]
struct ConnectionMetricsInner {
    connect_attempts: AtomicU64,
    connect_successes: AtomicU64,
    active_connections: AtomicU64,
    disconnections: AtomicU64,
}

/// Cheaply cloneable handle onto shared connection counters.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    inner: Arc<ConnectionMetricsInner>,
}

impl ConnectionMetrics {
    fn new() -> Self {
        Self {
            inner: Arc::new(ConnectionMetricsInner::default()),
        }
    }

    /// Records a connection attempt.
    pub fn incr_attempt(&self) {
        self.inner.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful connection, incrementing the active count.
    pub fn incr_success(&self) {
        self.inner.connect_successes.fetch_add(1, Ordering::Relaxed);
        self.inner.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a disconnection, decrementing the active count.
    pub fn incr_disconnection(&self) {
        self.inner.disconnections.fetch_add(1, Ordering::Relaxed);
        self.inner.active_connections.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_sub(1))
        }).ok();
    }

    /// Total connection attempts recorded.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::Relaxed)
    }

    /// Total successful connections recorded.
    #[must_use]
    pub fn connect_successes(&self) -> u64 {
        self.inner.connect_successes.load(Ordering::Relaxed)
    }

    /// Connections currently believed to be live.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        self.inner.active_connections.load(Ordering::Relaxed)
    }

    /// Total disconnections recorded.
    #[must_use]
    pub fn disconnections(&self) -> u64 {
        self.inner.disconnections.load(Ordering::Relaxed)
    }

    /// `connect_successes / connect_attempts`, or `1.0` with no attempts yet.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let attempts = self.connect_attempts();
        if attempts == 0 {
            return 1.0;
        }
        self.connect_successes() as f64 / attempts as f64
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.inner.connect_attempts.store(0, Ordering::Relaxed);
        self.inner.connect_successes.store(0, Ordering::Relaxed);
        self.inner.active_connections.store(0, Ordering::Relaxed);
        self.inner.disconnections.store(0, Ordering::Relaxed);
    }
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-validation-point success/failure counters (§4.9).
#[derive(Debug, Default)]
struct ValidationMetricsInner {
    points: RwLock<HashMap<String, (u64, u64, Option<String>)>>,
}

/// Cheaply cloneable handle onto shared validation counters.
#[derive(Debug, Clone)]
pub struct ValidationMetrics {
    inner: Arc<ValidationMetricsInner>,
}

impl ValidationMetrics {
    fn new() -> Self {
        Self {
            inner: Arc::new(ValidationMetricsInner::default()),
        }
    }

    /// Records a validation success at `point` (e.g. `"topic_config"`).
    pub fn incr_success(&self, point: &str) {
        let mut points = self.inner.points.write();
        let entry = points.entry(point.to_string()).or_insert((0, 0, None));
        entry.0 += 1;
    }

    /// Records a validation failure at `point`, keeping `reason` as the
    /// last failure reason.
    pub fn incr_failure(&self, point: &str, reason: impl Into<String>) {
        let mut points = self.inner.points.write();
        let entry = points.entry(point.to_string()).or_insert((0, 0, None));
        entry.1 += 1;
        entry.2 = Some(reason.into());
    }

    /// `(successes, failures, last_failure_reason)` for `point`.
    #[must_use]
    pub fn for_point(&self, point: &str) -> (u64, u64, Option<String>) {
        self.inner.points.read().get(point).cloned().unwrap_or((0, 0, None))
    }

    /// Clears every counter.
    pub fn reset(&self) {
        self.inner.points.write().clear();
    }
}

impl Default for ValidationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate handle onto all three counter groups, cheap to clone and
/// share across the pool, client facade, and debug tap.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Connection lifecycle counters.
    pub connections: ConnectionMetrics,
    /// Error taxonomy counters.
    pub errors: ErrorMetrics,
    /// Per-validation-point counters.
    pub validation: ValidationMetrics,
}

impl Metrics {
    /// Creates a fresh, zeroed metrics handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every counter group.
    pub fn reset(&self) {
        self.connections.reset();
        self.errors.reset();
        self.validation.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_metrics_tracks_active_count() {
        let m = ConnectionMetrics::new();
        m.incr_attempt();
        m.incr_success();
        assert_eq!(m.active_connections(), 1);
        m.incr_disconnection();
        assert_eq!(m.active_connections(), 0);
        assert_eq!(m.disconnections(), 1);
    }

    #[test]
    fn connection_metrics_success_rate() {
        let m = ConnectionMetrics::new();
        assert_eq!(m.success_rate(), 1.0);
        m.incr_attempt();
        m.incr_attempt();
        m.incr_success();
        assert!((m.success_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn error_metrics_records_disconnect_error() {
        let errors = ErrorMetrics::new();
        errors.incr_disconnect_error("client-1", 0x8E);
        assert_eq!(errors.total_for_category(ErrorCategory::DisconnectError), 1);
        assert_eq!(errors.count_for(ErrorCategory::DisconnectError, "client-1"), 1);
    }

    #[test]
    fn error_metrics_separates_subjects() {
        let errors = ErrorMetrics::new();
        errors.record(ErrorCategory::Publish, "t/a", "timeout");
        errors.record(ErrorCategory::Publish, "t/b", "timeout");
        assert_eq!(errors.total_for_category(ErrorCategory::Publish), 2);
        assert_eq!(errors.count_for(ErrorCategory::Publish, "t/a"), 1);
    }

    #[test]
    fn validation_metrics_tracks_last_reason() {
        let v = ValidationMetrics::new();
        v.incr_success("topic");
        v.incr_failure("topic", "empty topic");
        let (successes, failures, reason) = v.for_point("topic");
        assert_eq!(successes, 1);
        assert_eq!(failures, 1);
        assert_eq!(reason.as_deref(), Some("empty topic"));
    }

    #[test]
    fn metrics_reset_clears_all_groups() {
        let metrics = Metrics::new();
        metrics.connections.incr_attempt();
        metrics.errors.incr_disconnect_error("c1", 0x8E);
        metrics.validation.incr_failure("topic", "bad");
        metrics.reset();
        assert_eq!(metrics.connections.connect_attempts(), 0);
        assert_eq!(metrics.errors.total_for_category(ErrorCategory::DisconnectError), 0);
        assert_eq!(metrics.validation.for_point("topic"), (0, 0, None));
    }
}
