// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message History (§4.11.2): a bounded ring buffer every attached
//! message enters, regardless of display mode or active filter.

use std::collections::VecDeque;

use crate::debug_tap::DebugMessage;
use crate::topic::filter_matches;

/// Which side of the wire a [`HistoryEntry`] was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A message the broker delivered to us.
    Inbound,
    /// A message we sent to the broker.
    Outbound,
}

/// One recorded Debug Tap message, tagged with a monotonic id and the
/// direction it travelled.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Monotonically increasing id, assigned at insertion (never reused).
    pub id: u64,
    /// The underlying wire message.
    pub message: DebugMessage,
    /// Inbound (broker → us) or outbound (us → broker).
    pub direction: Direction,
}

impl HistoryEntry {
    /// The MQTT topic this entry concerns, if its payload carries one.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.message.payload.get("topic").and_then(|v| v.as_str())
    }

    /// The QoS this entry concerns, if its payload carries one.
    #[must_use]
    pub fn qos(&self) -> Option<u8> {
        self.message.payload.get("qos").and_then(serde_json::Value::as_u64).map(|q| q as u8)
    }
}

/// Bounded ring buffer of [`HistoryEntry`] records (§4.11.2).
///
/// Grounded on the teacher's bounded-queue idiom in `subscription::callback`
/// event buffering: a `VecDeque` capped at a fixed capacity, evicting the
/// oldest entry on overflow.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    next_id: u64,
}

impl History {
    /// Creates a history bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity: capacity.max(1), next_id: 1 }
    }

    /// Appends `message`, evicting the oldest entry if at capacity.
    /// Returns the id assigned to the new entry.
    pub fn push(&mut self, message: DebugMessage, direction: Direction) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry { id, message, direction });
        id
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by its assigned id.
    #[must_use]
    pub fn by_id(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Looks up the `k`-th most recent entry (`0` is the newest, `-1`
    /// offsets expressed as a positive `k` count back from the end).
    #[must_use]
    pub fn by_offset(&self, k: usize) -> Option<&HistoryEntry> {
        let len = self.entries.len();
        if k >= len {
            None
        } else {
            self.entries.get(len - 1 - k)
        }
    }

    /// The newest entry, if any.
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// The most recent `limit` entries, oldest first.
    #[must_use]
    pub fn range(&self, limit: usize) -> Vec<&HistoryEntry> {
        let len = self.entries.len();
        let start = len.saturating_sub(limit);
        self.entries.iter().skip(start).collect()
    }

    /// Every entry whose payload or source contains `needle`.
    #[must_use]
    pub fn search(&self, needle: &str) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.message.source.contains(needle) || e.message.payload.to_string().contains(needle))
            .collect()
    }

    /// Every entry whose topic matches the MQTT filter pattern
    /// `mqtt_pattern` (supporting `+`/`#` wildcards).
    #[must_use]
    pub fn filter_by_topic(&self, mqtt_pattern: &str) -> Vec<&HistoryEntry> {
        self.entries.iter().filter(|e| e.topic().is_some_and(|t| filter_matches(mqtt_pattern, t))).collect()
    }

    /// Iterates every retained entry, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: u64) -> DebugMessage {
        DebugMessage::system(format!("msg-{n}"))
    }

    #[test]
    fn capacity_boundary_retains_the_newest_window() {
        // 140 inserts into a capacity-100 buffer retain ids 41..=140.
        let mut history = History::new(100);
        for n in 1..=140u64 {
            history.push(message(n), Direction::Inbound);
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.last().unwrap().id, 140);
        let oldest_id = history.range(100).first().unwrap().id;
        assert_eq!(oldest_id, 41);
    }

    #[test]
    fn by_offset_zero_is_newest() {
        let mut history = History::new(10);
        history.push(message(1), Direction::Inbound);
        history.push(message(2), Direction::Inbound);
        assert_eq!(history.by_offset(0).unwrap().id, 2);
        assert_eq!(history.by_offset(1).unwrap().id, 1);
        assert!(history.by_offset(2).is_none());
    }

    #[test]
    fn by_id_finds_an_evicted_id_as_none() {
        let mut history = History::new(2);
        history.push(message(1), Direction::Inbound);
        history.push(message(2), Direction::Inbound);
        history.push(message(3), Direction::Inbound);
        assert!(history.by_id(1).is_none());
        assert!(history.by_id(3).is_some());
    }
}
