// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wires registered [`Listener`]s to a live [`EventBus`] (§4.5).
//!
//! Grounded on the teacher's `subscription::callback::CallbackRegistry`
//! dispatch loop: a background task drains a `broadcast::Receiver` and
//! hands every event to each registered listener in turn.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

use super::bus::EventBus;
use super::listeners::Listener;

/// A set of [`Listener`]s driven by one background task over an
/// [`EventBus`] subscription.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn Listener>>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, listener: impl Listener) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Spawns the dispatch loop: every event published on `bus` is handed
    /// to each registered listener, in registration order. Exits only
    /// once `bus` has no more senders.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let mut receiver = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        for listener in &self.listeners {
                            listener.on_event(&event);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event dispatcher lagged behind the bus; some events were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::event::{DisconnectType, MqttEvent, OnDisconnectEvent};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl Listener for CountingListener {
        fn on_event(&self, _event: &MqttEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dispatch_loop_hands_every_event_to_every_listener() {
        let bus = EventBus::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let dispatcher = EventDispatcher::new()
            .with(CountingListener { count: count_a.clone() })
            .with(CountingListener { count: count_b.clone() });
        let handle = dispatcher.spawn(&bus);

        bus.publish(MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Normal,
            code: 0x00,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        }));

        // Give the spawned task a turn to drain the channel.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
        handle.abort();
    }
}
