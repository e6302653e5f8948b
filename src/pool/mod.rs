// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection Pool (§4.3).
//!
//! Grounded on the teacher's `protocol::broker_pool::BrokerPool`: a single
//! `RwLock`-guarded table, connections created lazily and torn down when
//! nobody references them. This module generalizes that one-per-broker
//! singleton into a sized pool (`min..=max`) with context affinity, lease
//! accounting, and `wait_timeout_s`-bounded borrowing, per §4.3's
//! invariants. The teacher's "reserve a placeholder, connect unlocked,
//! fill the slot on completion" idiom (`get_connection` / `create_connection`)
//! is preserved: the pool lock is never held across a connect.

mod connection_like;

pub use connection_like::{ConnectionFactory, PoolConnection};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::config::PoolConfig;
use crate::error::{Error, PoolExhaustedError, Result};
use crate::metrics::Metrics;
use crate::protocol::ConnectionState;

/// One pool-managed slot.
struct Slot<C> {
    /// `None` while a placeholder reserved for an in-flight `connect`; no
    /// borrower may be handed this slot until it is filled in.
    connection: Option<Arc<C>>,
    /// `None` when idle and unbound; `Some(lease_id)` while exclusively
    /// leased to a non-context borrower.
    leased_by: Option<u64>,
    /// Number of context borrowers currently holding a reference, when
    /// this slot is context-bound.
    context_refs: u32,
}

/// Index of the first idle, already-connected slot, if any. Never awaits:
/// the pool lock may be held across this call, but never across the
/// connect or health-check that follow it.
fn find_idle_index<C>(slots: &[Slot<C>]) -> Option<usize> {
    slots
        .iter()
        .position(|s| s.connection.is_some() && s.leased_by.is_none() && s.context_refs == 0)
}

struct PoolInner<F: ConnectionFactory> {
    name: String,
    factory: F,
    config: PoolConfig,
    slots: Mutex<Vec<Slot<F::Connection>>>,
    contexts: Mutex<HashMap<String, usize>>,
    next_lease_id: AtomicU64,
    returned: Notify,
    metrics: Metrics,
}

/// Sized, context-affine pool of [`PoolConnection`]s (§4.3).
///
/// Cheap to clone: every clone shares the same slot table, matching the
/// teacher's pattern of a process-wide pool handle.
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Creates a new, empty pool. Call [`Pool::warm_up`] to populate it to
    /// `min_connections`.
    #[must_use]
    pub fn new(name: impl Into<String>, factory: F, config: PoolConfig, metrics: Metrics) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                factory,
                config,
                slots: Mutex::new(Vec::new()),
                contexts: Mutex::new(HashMap::new()),
                next_lease_id: AtomicU64::new(1),
                returned: Notify::new(),
                metrics,
            }),
        }
    }

    /// Name of this pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of live slots (leased or idle).
    pub async fn live_count(&self) -> usize {
        self.inner.slots.lock().await.len()
    }

    /// Creates connections until `live_count >= min_connections` (§4.3
    /// "at steady state the Pool maintains `min` warm connections").
    pub async fn warm_up(&self) -> Result<()> {
        let min = self.inner.config.min_connections() as usize;
        loop {
            let count = self.inner.slots.lock().await.len();
            if count >= min {
                return Ok(());
            }
            let connection = self.inner.factory.create().await?;
            self.inner.slots.lock().await.push(Slot {
                connection: Some(Arc::new(connection)),
                leased_by: None,
                context_refs: 0,
            });
        }
    }

    /// Borrows a connection, blocking up to `wait_timeout_s`.
    ///
    /// When `context` is given, repeated calls with the same context id
    /// return the same underlying connection (§4.3 "context affinity").
    pub async fn borrow(&self, context: Option<&str>) -> Result<Lease<F>> {
        let deadline = Duration::from_secs(u64::from(self.inner.config.wait_timeout_s()));
        let start = tokio::time::Instant::now();

        loop {
            if let Some(lease) = self.try_borrow(context).await? {
                return Ok(lease);
            }

            let remaining = deadline.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return Err(Error::PoolExhausted(PoolExhaustedError {
                    pool_name: self.inner.name.clone(),
                    live: self.inner.slots.lock().await.len(),
                    max: self.inner.config.max_connections() as usize,
                }));
            }
            let _ = tokio::time::timeout(remaining, self.inner.returned.notified()).await;
        }
    }

    async fn try_borrow(&self, context: Option<&str>) -> Result<Option<Lease<F>>> {
        match context {
            Some(ctx) => self.try_borrow_context(ctx).await,
            None => self.try_borrow_exclusive().await,
        }
    }

    /// Context-affine borrow path (§4.3 "context affinity"). Never holds
    /// `slots` or `contexts` across a connect: a not-yet-connected binding
    /// is represented by a placeholder `Slot` with `connection: None`, and
    /// filled in after the handshake completes, unlocked.
    async fn try_borrow_context(&self, ctx: &str) -> Result<Option<Lease<F>>> {
        if let Some(&index) = self.inner.contexts.lock().await.get(ctx) {
            let mut slots = self.inner.slots.lock().await;
            slots[index].context_refs += 1;
            let connection = slots[index].connection.clone();
            drop(slots);
            let Some(connection) = connection else {
                // Another borrower's connect for this context is still in
                // flight; the caller's `borrow()` loop retries after the
                // next `returned` notification.
                return Ok(None);
            };
            let connection = self.ensure_healthy(index, connection).await?;
            return Ok(Some(Lease::context(self.clone(), connection, ctx.to_string())));
        }

        enum Claim<C> {
            Idle(usize, Arc<C>),
            Placeholder(usize),
            Exhausted,
        }

        let claim = {
            let mut contexts = self.inner.contexts.lock().await;
            if contexts.contains_key(ctx) {
                // Lost the race to another borrower binding this context;
                // let the caller retry.
                return Ok(None);
            }
            let mut slots = self.inner.slots.lock().await;
            if let Some(index) = find_idle_index(&slots) {
                slots[index].context_refs = 1;
                let connection = slots[index].connection.clone().expect("idle slot is always connected");
                contexts.insert(ctx.to_string(), index);
                Claim::Idle(index, connection)
            } else if slots.len() >= self.inner.config.max_connections() as usize {
                Claim::Exhausted
            } else {
                slots.push(Slot { connection: None, leased_by: None, context_refs: 1 });
                let index = slots.len() - 1;
                contexts.insert(ctx.to_string(), index);
                Claim::Placeholder(index)
            }
        };

        match claim {
            Claim::Idle(index, connection) => {
                let connection = self.ensure_healthy(index, connection).await?;
                Ok(Some(Lease::context(self.clone(), connection, ctx.to_string())))
            }
            Claim::Placeholder(index) => {
                let connection = Arc::new(self.inner.factory.create().await?);
                let mut slots = self.inner.slots.lock().await;
                slots[index].connection = Some(connection.clone());
                drop(slots);
                self.inner.returned.notify_waiters();
                Ok(Some(Lease::context(self.clone(), connection, ctx.to_string())))
            }
            Claim::Exhausted => Ok(None),
        }
    }

    /// Exclusive borrow path. Same placeholder-then-fill discipline as
    /// [`Self::try_borrow_context`], just without the context table.
    async fn try_borrow_exclusive(&self) -> Result<Option<Lease<F>>> {
        enum Claim<C> {
            Idle(usize, u64, Arc<C>),
            Placeholder(usize, u64),
            Exhausted,
        }

        let claim = {
            let mut slots = self.inner.slots.lock().await;
            if let Some(index) = find_idle_index(&slots) {
                let lease_id = self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed);
                slots[index].leased_by = Some(lease_id);
                let connection = slots[index].connection.clone().expect("idle slot is always connected");
                Claim::Idle(index, lease_id, connection)
            } else if slots.len() >= self.inner.config.max_connections() as usize {
                Claim::Exhausted
            } else {
                let lease_id = self.inner.next_lease_id.fetch_add(1, Ordering::Relaxed);
                slots.push(Slot { connection: None, leased_by: Some(lease_id), context_refs: 0 });
                Claim::Placeholder(slots.len() - 1, lease_id)
            }
        };

        match claim {
            Claim::Idle(index, lease_id, connection) => {
                let connection = self.ensure_healthy(index, connection).await?;
                Ok(Some(Lease::exclusive(self.clone(), connection, lease_id)))
            }
            Claim::Placeholder(index, lease_id) => {
                let connection = Arc::new(self.inner.factory.create().await?);
                let mut slots = self.inner.slots.lock().await;
                slots[index].connection = Some(connection.clone());
                drop(slots);
                Ok(Some(Lease::exclusive(self.clone(), connection, lease_id)))
            }
            Claim::Exhausted => Ok(None),
        }
    }

    /// Health-checks an idle slot's connection, unlocked, replacing it if
    /// the check fails. Only re-acquires `slots` to install a replacement;
    /// the handshake itself always runs without the lock held (§4.3).
    async fn ensure_healthy(&self, index: usize, connection: Arc<F::Connection>) -> Result<Arc<F::Connection>> {
        if connection.health_check().await.is_ok() {
            return Ok(connection);
        }
        connection.close(0x00).await;
        let replacement = Arc::new(self.inner.factory.create().await?);
        let mut slots = self.inner.slots.lock().await;
        slots[index].connection = Some(replacement.clone());
        drop(slots);
        Ok(replacement)
    }

    /// Releases a lease exactly once. A second release for the same lease
    /// id is a programmer error (§4.3 "double-release ... must be
    /// surfaced") and returns [`Error::DoubleRelease`].
    async fn release_exclusive(&self, lease_id: u64) -> Result<()> {
        let mut slots = self.inner.slots.lock().await;
        let Some(index) = slots.iter().position(|s| s.leased_by == Some(lease_id)) else {
            return Err(Error::DoubleRelease(lease_id));
        };
        slots[index].leased_by = None;
        let connection = slots[index].connection.clone();
        drop(slots);

        if let Some(connection) = connection {
            let min = self.inner.config.min_connections() as usize;
            if connection.pool_state().await == ConnectionState::Closed {
                let mut slots = self.inner.slots.lock().await;
                if slots.len() > min {
                    slots.retain(|s| !s.connection.as_ref().is_some_and(|c| Arc::ptr_eq(c, &connection)));
                }
            }
        }

        self.inner.returned.notify_waiters();
        Ok(())
    }

    async fn release_context(&self, context: &str) {
        let mut contexts = self.inner.contexts.lock().await;
        let mut slots = self.inner.slots.lock().await;
        if let Some(&index) = contexts.get(context) {
            if slots[index].context_refs > 0 {
                slots[index].context_refs -= 1;
            }
            if slots[index].context_refs == 0 {
                contexts.remove(context);
            }
        }
        drop(slots);
        self.inner.returned.notify_waiters();
    }
}

/// A borrowed connection. Released automatically on drop (spawns a
/// best-effort async release task, mirroring the teacher's
/// `PooledMqttClient`'s `Drop` impl) or explicitly via [`Lease::release`].
pub struct Lease<F: ConnectionFactory> {
    pool: Pool<F>,
    connection: Arc<F::Connection>,
    kind: LeaseKind,
    released: bool,
}

enum LeaseKind {
    Exclusive(u64),
    Context(String),
}

impl<F: ConnectionFactory> Lease<F> {
    fn exclusive(pool: Pool<F>, connection: Arc<F::Connection>, lease_id: u64) -> Self {
        Self { pool, connection, kind: LeaseKind::Exclusive(lease_id), released: false }
    }

    fn context(pool: Pool<F>, connection: Arc<F::Connection>, context: String) -> Self {
        Self { pool, connection, kind: LeaseKind::Context(context), released: false }
    }

    /// The leased connection.
    #[must_use]
    pub fn connection(&self) -> &F::Connection {
        &self.connection
    }

    /// Explicitly releases the lease. Prefer this over relying on `Drop`
    /// when the caller can await the release completing.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match &self.kind {
            LeaseKind::Exclusive(id) => self.pool.release_exclusive(*id).await,
            LeaseKind::Context(ctx) => {
                self.pool.release_context(ctx).await;
                Ok(())
            }
        }
    }
}

impl<F: ConnectionFactory> Drop for Lease<F> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let pool = self.pool.clone();
        match &self.kind {
            LeaseKind::Exclusive(id) => {
                let id = *id;
                tokio::spawn(async move {
                    let _ = pool.release_exclusive(id).await;
                });
            }
            LeaseKind::Context(ctx) => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    pool.release_context(&ctx).await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct FakeConnection {
        pool_name: String,
        healthy: AtomicBool,
        state: std::sync::Mutex<ConnectionState>,
    }

    impl PoolConnection for FakeConnection {
        async fn pool_state(&self) -> ConnectionState {
            *self.state.lock().unwrap()
        }

        async fn health_check(&self) -> Result<()> {
            if self.healthy.load(Ordering::Relaxed) {
                Ok(())
            } else {
                Err(Error::NotSubscribed)
            }
        }

        async fn close(&self, _code: u8) {
            *self.state.lock().unwrap() = ConnectionState::Closed;
        }

        fn pool_name(&self) -> &str {
            &self.pool_name
        }
    }

    struct FakeFactory {
        pool_name: String,
        created: AtomicU64,
    }

    impl ConnectionFactory for FakeFactory {
        type Connection = FakeConnection;

        async fn create(&self) -> Result<Self::Connection> {
            self.created.fetch_add(1, Ordering::Relaxed);
            Ok(FakeConnection {
                pool_name: self.pool_name.clone(),
                healthy: AtomicBool::new(true),
                state: std::sync::Mutex::new(ConnectionState::Connected),
            })
        }
    }

    fn test_config(min: u32, max: u32) -> PoolConfig {
        let raw = crate::config::RawPoolConfig {
            min_connections: min,
            max_connections: max,
            connect_timeout_s: 1,
            wait_timeout_s: 1,
            heartbeat_s: None,
            max_idle_time_s: 300,
        };
        crate::config::validate_pool(&raw).unwrap()
    }

    #[tokio::test]
    async fn borrow_creates_connection_up_to_max() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(0, 1), Metrics::new());

        let lease = pool.borrow(None).await.unwrap();
        assert_eq!(pool.live_count().await, 1);
        drop(lease);
    }

    #[tokio::test]
    async fn borrow_exhausts_at_max_and_times_out() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(0, 1), Metrics::new());

        let lease = pool.borrow(None).await.unwrap();
        let result = pool.borrow(None).await;
        assert!(matches!(result, Err(Error::PoolExhausted(_))));
        drop(lease);
    }

    #[tokio::test]
    async fn release_frees_slot_for_next_borrow() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(0, 1), Metrics::new());

        let lease = pool.borrow(None).await.unwrap();
        lease.release().await.unwrap();
        assert!(pool.borrow(None).await.is_ok());
    }

    #[tokio::test]
    async fn context_borrows_reuse_same_connection() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(0, 2), Metrics::new());

        let lease1 = pool.borrow(Some("ctx-a")).await.unwrap();
        let lease2 = pool.borrow(Some("ctx-a")).await.unwrap();
        assert!(Arc::ptr_eq(&lease1.connection, &lease2.connection));
        assert_eq!(pool.live_count().await, 1);
    }

    #[tokio::test]
    async fn warm_up_creates_min_connections() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(2, 5), Metrics::new());
        pool.warm_up().await.unwrap();
        assert_eq!(pool.live_count().await, 2);
    }

    #[tokio::test]
    async fn unhealthy_idle_connection_is_replaced_before_reuse() {
        let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
        let pool = Pool::new("default", factory, test_config(0, 1), Metrics::new());

        let lease = pool.borrow(None).await.unwrap();
        lease.connection().healthy.store(false, Ordering::Relaxed);
        lease.release().await.unwrap();

        let _lease2 = pool.borrow(None).await.unwrap();
        // The unhealthy slot should have been replaced with a fresh one.
        assert!(_lease2.connection().healthy.load(Ordering::Relaxed));
    }
}
