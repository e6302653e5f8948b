// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traits the Connection Pool depends on, kept separate from
//! [`crate::protocol::Connection`] so the pool can be exercised in tests
//! against an in-process fake with no live broker.

use crate::error::Result;
use crate::protocol::ConnectionState;

/// Anything the Connection Pool can lease out and health-check.
///
/// Implemented by [`crate::protocol::Connection`] for production use, and
/// by a fake in pool unit tests.
pub trait PoolConnection: Send + Sync + 'static {
    /// Current lifecycle state.
    fn pool_state(&self) -> impl std::future::Future<Output = ConnectionState> + Send;

    /// Cheap liveness probe used before handing out a connection that has
    /// been idle longer than `max_idle_time_s`.
    fn health_check(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Tears the connection down with the given DISCONNECT reason code.
    fn close(&self, code: u8) -> impl std::future::Future<Output = ()> + Send;

    /// Name of the pool this connection was created for.
    fn pool_name(&self) -> &str;
}

/// Creates new [`PoolConnection`]s on demand for a [`super::Pool`].
///
/// Grounded on the teacher's `BrokerPool::create_connection`, pulled out
/// into an injectable factory so the pool's sizing/health/context logic
/// can be unit-tested without a live broker (§8's pool-exhaustion and
/// disconnect-classification scenarios both exercise this path).
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The connection type this factory produces.
    type Connection: PoolConnection;

    /// Creates and fully establishes one new connection.
    fn create(&self) -> impl std::future::Future<Output = Result<Self::Connection>> + Send;
}
