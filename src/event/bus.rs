// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process event bus (§4.5).
//!
//! Grounded directly on the teacher's `event::event_bus::EventBus`: a thin
//! wrapper around `tokio::sync::broadcast` giving every subscriber its own
//! copy of each event. §4.5 notes the library "does not ship its own bus"
//! in the sense of depending on a host DI-resolved implementation; this
//! type is the concrete default the host wires in, matching the ambient
//! stack rule that observability plumbing is still carried even though
//! cluster-wide coordination is a named Non-goal.

use tokio::sync::broadcast;

use super::MqttEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`MqttEvent`]s to every subscriber.
///
/// If the channel is full for a slow subscriber, that subscriber misses
/// the oldest buffered events and receives `RecvError::Lagged` on its next
/// `recv()`. Per §5, "when multiple listeners observe the same event
/// their relative order is unspecified" — `tokio::sync::broadcast` already
/// gives exactly this guarantee.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<MqttEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MqttEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Silently discarded if there are no subscribers.
    pub fn publish(&self, event: MqttEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes an event, returning how many subscribers received it.
    #[must_use]
    pub fn publish_counted(&self, event: MqttEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DisconnectType, OnDisconnectEvent};

    fn sample_event() -> MqttEvent {
        MqttEvent::OnDisconnect(OnDisconnectEvent {
            disconnect_type: DisconnectType::Normal,
            code: 0x00,
            pool_name: "default".to_string(),
            client_id: "c1".to_string(),
            qos: None,
        })
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        assert_eq!(EventBus::new().subscriber_count(), 0);
    }

    #[test]
    fn subscribe_increments_count() {
        let bus = EventBus::new();
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn drop_subscriber_decrements_count() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(sample_event());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.tag(), "on_disconnect");
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(sample_event());
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn publish_counted_returns_zero_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish_counted(sample_event()), 0);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
