// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pool exhaustion and recovery, against a faked connection so
//! no live broker is needed.

use std::sync::atomic::{AtomicU64, Ordering};

use mqtt_pool_lib::config::{RawPoolConfig, validate_pool};
use mqtt_pool_lib::error::Error;
use mqtt_pool_lib::metrics::Metrics;
use mqtt_pool_lib::pool::{ConnectionFactory, Pool, PoolConnection};
use mqtt_pool_lib::protocol::ConnectionState;

struct FakeConnection {
    pool_name: String,
}

impl PoolConnection for FakeConnection {
    async fn pool_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }

    async fn health_check(&self) -> mqtt_pool_lib::error::Result<()> {
        Ok(())
    }

    async fn close(&self, _code: u8) {}

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

    async fn create(&self) -> mqtt_pool_lib::error::Result<Self::Connection> {
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(FakeConnection { pool_name: self.pool_name.clone() })
    }
}

/// Pool `{min:1,max:2,wait_timeout_s:1}` with two outstanding borrows; a
/// third borrow suspends; one borrower returns at t=0.3s so the third
/// resumes; a fourth borrow started while both slots are out again fails
/// with `PoolExhausted` once `wait_timeout_s` elapses.
#[tokio::test(start_paused = true)]
async fn scenario_s4_pool_exhaustion_and_recovery() {
    let factory = FakeFactory { pool_name: "default".to_string(), created: AtomicU64::new(0) };
    let config = validate_pool(&RawPoolConfig {
        min_connections: 1,
        max_connections: 2,
        wait_timeout_s: 1,
        ..RawPoolConfig::default()
    })
    .unwrap();
    let pool = Pool::new("default", factory, config, Metrics::new());

    let lease_a = pool.borrow(None).await.unwrap();
    let lease_b = pool.borrow(None).await.unwrap();
    assert_eq!(pool.live_count().await, 2);

    let pool_for_waiter = pool.clone();
    let waiter = tokio::spawn(async move { pool_for_waiter.borrow(None).await });

    tokio::time::advance(std::time::Duration::from_millis(300)).await;
    lease_a.release().await.unwrap();

    let lease_c = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
        .await
        .expect("waiter did not resume after release")
        .unwrap()
        .expect("third borrow should have succeeded once a, slot freed");

    // Both slots (b, c) are out again; a fourth borrow exhausts and times out.
    let exhausted = pool.borrow(None).await;
    assert!(matches!(exhausted, Err(Error::PoolExhausted(_))), "expected PoolExhausted, got {exhausted:?}");

    drop(lease_b);
    drop(lease_c);
}
