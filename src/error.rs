// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the pooled MQTT client library.
//!
//! This module provides a comprehensive error hierarchy covering
//! configuration validation, connection pooling, protocol communication,
//! and the debug shell's filter grammar.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The connection pool could not satisfy a borrow request.
    #[error("pool exhausted: {0}")]
    PoolExhausted(#[from] PoolExhaustedError),

    /// The underlying MQTT protocol reported a failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An operation exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutError),

    /// A public API call was given invalid input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// `receive()` was called on a connection that is not a subscriber.
    #[error("connection is not subscribed to any topic")]
    NotSubscribed,

    /// A caller released an already-released lease.
    #[error("lease {0} was already released")]
    DoubleRelease(u64),
}

/// A specialized `Result` type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the `config` module's validators (§4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ConfigError {
    /// Name of the field that failed validation.
    pub field: String,
    /// Human-readable reason for the failure.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new config error.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Raised when a pool borrow cannot be satisfied within `wait_timeout_s`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("pool '{pool_name}' exhausted (live={live}, max={max})")]
pub struct PoolExhaustedError {
    /// Name of the pool that was exhausted.
    pub pool_name: String,
    /// Number of live connections at the time of the failure.
    pub live: usize,
    /// Configured maximum pool size.
    pub max: usize,
}

/// Errors surfaced by the Protocol Connection (§4.2).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying MQTT client reported an error.
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The underlying MQTT connection/event loop reported an error.
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// The broker returned a non-success reason code during CONNECT.
    #[error("broker rejected connection in phase {phase}: code {code}")]
    Rejected {
        /// Protocol phase in which the rejection occurred (e.g. "connect").
        phase: &'static str,
        /// Broker reason code.
        code: u8,
    },

    /// A channel used to route frames between tasks was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The connection's internal state does not permit the requested
    /// operation (e.g. `publish` on a `Closed` connection).
    #[error("invalid connection state: expected {expected}, found {actual}")]
    InvalidState {
        /// The state the operation required.
        expected: &'static str,
        /// The state the connection was actually in.
        actual: &'static str,
    },
}

/// Raised when an operation exceeds its configured deadline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("operation '{operation}' timed out after {elapsed_ms}ms")]
pub struct TimeoutError {
    /// Name of the operation that timed out (e.g. "connect", "borrow").
    pub operation: &'static str,
    /// Elapsed time in milliseconds before the deadline was hit.
    pub elapsed_ms: u64,
}

/// Raised by the Client Facade (§4.4) when a public call's arguments fail
/// `config` validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Name of the field that failed validation.
    pub field: String,
    /// Human-readable reason for the failure.
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for ValidationError {
    fn from(e: ConfigError) -> Self {
        Self {
            field: e.field,
            reason: e.reason,
        }
    }
}

/// Raised by the debug shell's filter grammar (§4.11.1) on malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("filter parse error: {0}")]
pub struct FilterParseError(pub String);

/// Raised by the debug tap (§4.10) for a single misbehaving client; never
/// propagated beyond that client's connection.
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub std::io::Error);
