// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridges the Event Bus Surface to the Debug Tap (§4.5, §4.10): every
//! `OnPublish`/`OnReceive`/`OnSubscribe`/`OnDisconnect` event mirrors onto
//! attached shell clients without call sites needing to know the tap
//! exists.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::DebugTap;
use crate::event::{Listener, MqttEvent};

/// Listener that forwards every bus event onto an attached [`DebugTap`].
///
/// Holds the tap behind an `Arc<Mutex<_>>` so it can be driven
/// concurrently by the host's own tap-ticking loop (accepting new shell
/// connections) and this listener's background forwarding task.
#[derive(Clone)]
pub struct DebugTapListener {
    tap: Arc<Mutex<DebugTap>>,
}

impl DebugTapListener {
    /// Creates a listener forwarding onto `tap`.
    #[must_use]
    pub fn new(tap: Arc<Mutex<DebugTap>>) -> Self {
        Self { tap }
    }
}

impl Listener for DebugTapListener {
    fn on_event(&self, event: &MqttEvent) {
        let tap = self.tap.clone();
        let event = event.clone();
        tokio::spawn(async move {
            tap.lock().await.broadcast(&event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DisconnectType, OnDisconnectEvent};

    #[tokio::test]
    async fn forwards_event_to_tap_without_blocking() {
        let tap = Arc::new(Mutex::new(DebugTap::new("/tmp/mqtt-pool-lib-listener-test.sock", false)));
        let listener = DebugTapListener::new(tap);

        listener.on_event(&MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Normal,
            code: 0x00,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        }));

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
