// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol Connection (§4.2): the state machine and FIFO ack-correlated
//! wrapper around the injected `rumqttc` codec.

mod connection;

pub use connection::{Connection, ConnectionState, IncomingFrame, PublishOutcome, SubAckCodes};

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::event::EventBus;
use crate::metrics::Metrics;
use crate::pool::{ConnectionFactory, PoolConnection};

impl PoolConnection for Connection {
    async fn pool_state(&self) -> ConnectionState {
        self.state().await
    }

    async fn health_check(&self) -> Result<()> {
        if self.state().await == ConnectionState::Closed {
            Err(crate::error::Error::Protocol(crate::error::ProtocolError::InvalidState {
                expected: "connected",
                actual: "closed",
            }))
        } else {
            Ok(())
        }
    }

    async fn close(&self, code: u8) {
        let _ = self.disconnect(code).await;
    }

    fn pool_name(&self) -> &str {
        Connection::pool_name(self)
    }
}

/// Produces live [`Connection`]s for a [`crate::pool::Pool`], using a
/// fixed `ClientConfig` and broker identity (§4.3).
#[derive(Clone)]
pub struct RumqttcConnectionFactory {
    pool_name: String,
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
    event_bus: Option<EventBus>,
    metrics: Metrics,
}

impl RumqttcConnectionFactory {
    /// Creates a factory that connects using `config` whenever the pool
    /// needs a new connection.
    #[must_use]
    pub fn new(
        pool_name: impl Into<String>,
        config: Arc<ClientConfig>,
        connect_timeout: Duration,
        event_bus: Option<EventBus>,
        metrics: Metrics,
    ) -> Self {
        Self { pool_name: pool_name.into(), config, connect_timeout, event_bus, metrics }
    }
}

impl ConnectionFactory for RumqttcConnectionFactory {
    type Connection = Connection;

    async fn create(&self) -> Result<Self::Connection> {
        Connection::connect(
            self.pool_name.clone(),
            self.config.clone(),
            self.connect_timeout,
            self.event_bus.clone(),
            self.metrics.clone(),
        )
        .await
    }
}
