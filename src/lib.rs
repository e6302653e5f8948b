// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A pooled, coroutine-safe MQTT v5 client library with shared and queue
//! subscriptions, event-driven dispatch, and an optional debug tap.
//!
//! # Architecture
//!
//! - [`config`] validates raw, `serde`-deserialized configuration into the
//!   immutable [`config::ClientConfig`], [`config::TopicConfig`], and
//!   [`config::PoolConfig`] records every other module builds on.
//! - [`protocol`] wraps the injected `rumqttc` wire codec in a state
//!   machine with FIFO ack correlation ([`protocol::Connection`]).
//! - [`pool`] borrows/leases/returns [`protocol::Connection`]s behind a
//!   generic, fake-testable [`pool::Pool`].
//! - [`client`] is the public facade applications call: `publish`,
//!   `subscribe`, `unsubscribe`, `receive`.
//! - [`event`] carries an [`event::EventBus`] broadcasting [`event::MqttEvent`]
//!   to [`event::Listener`]s.
//! - [`subscription`] records active subscriptions in a process-wide
//!   [`subscription::SubscriptionRegistry`].
//! - [`autosub`] warms up `auto_subscribe` topics at startup.
//! - [`metrics`] aggregates connection/validation/error counters.
//! - [`debug_tap`] and [`debug_shell`] implement the optional stream-socket
//!   tap and its companion interactive client (feature `debug-tap`).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mqtt_pool_lib::client::Client;
//! use mqtt_pool_lib::config::{RawClientConfig, RawPoolConfig, validate_connection, validate_pool};
//! use mqtt_pool_lib::event::{EventBus, EventDispatcher, PublishListener, SubscribeListener};
//! use mqtt_pool_lib::metrics::Metrics;
//! use mqtt_pool_lib::pool::Pool;
//! use mqtt_pool_lib::protocol::RumqttcConnectionFactory;
//! use mqtt_pool_lib::subscription::SubscriptionRegistry;
//!
//! # async fn example() -> mqtt_pool_lib::error::Result<()> {
//! let config = Arc::new(validate_connection(&RawClientConfig {
//!     host: "broker.example".to_string(),
//!     port: 1883,
//!     client_id: "app-1".to_string(),
//!     keep_alive: 30,
//!     protocol_level: 5,
//!     ..Default::default()
//! })?);
//! let pool_config =
//!     validate_pool(&RawPoolConfig { min_connections: 1, max_connections: 4, ..Default::default() })?;
//! let metrics = Metrics::new();
//! let event_bus = EventBus::new();
//!
//! let factory = RumqttcConnectionFactory::new(
//!     "default",
//!     config,
//!     Duration::from_secs(10),
//!     Some(event_bus.clone()),
//!     metrics.clone(),
//! );
//! let pool = Pool::new("default", factory, pool_config, metrics.clone());
//! let client = Client::new(pool, SubscriptionRegistry::new(), Some(event_bus.clone()), metrics);
//!
//! let _dispatcher = EventDispatcher::new()
//!     .with(PublishListener::new(client.clone()))
//!     .with(SubscribeListener::new(client.clone()))
//!     .spawn(&event_bus);
//!
//! client.publish("sensors/temp", b"23.5".to_vec(), 1, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod autosub;
pub mod client;
pub mod config;
#[cfg(feature = "debug-tap")]
pub mod debug_shell;
#[cfg(feature = "debug-tap")]
pub mod debug_tap;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pool;
pub mod protocol;
pub mod subscription;
pub mod topic;

pub use client::Client;
pub use error::{Error, Result};
