// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bookmarks (§4.11.3): named `@1..@N` / `@last` slots pointing at
//! history entry ids.

use std::collections::BTreeMap;

use super::history::History;

/// State of one bookmark slot. A slot whose target has aged out of
/// `History` is never dropped: it becomes [`Slot::Stale`] and keeps
/// showing up in [`Bookmarks::list`] (§4.11.3 "if evicted, the slot is
/// surfaced as `stale`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Live(u64),
    Stale(u64),
}

impl Slot {
    fn history_id(self) -> u64 {
        match self {
            Self::Live(id) | Self::Stale(id) => id,
        }
    }
}

/// Named bookmark slots over a [`History`] (§4.11.3).
#[derive(Debug, Default)]
pub struct Bookmarks {
    slots: BTreeMap<u32, Slot>,
    next_slot: u32,
}

impl Bookmarks {
    /// Creates an empty bookmark set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a bookmark at the next free `@N` slot, pointing at
    /// `history_id`. Returns the assigned slot number.
    pub fn set(&mut self, history_id: u64) -> u32 {
        self.next_slot += 1;
        self.slots.insert(self.next_slot, Slot::Live(history_id));
        self.next_slot
    }

    /// Resolves `@N` (or `@last`, via [`Self::resolve_last`]) to a history
    /// id, if the slot exists and is not stale.
    #[must_use]
    pub fn resolve(&self, slot: u32) -> Option<u64> {
        match self.slots.get(&slot)? {
            Slot::Live(id) => Some(*id),
            Slot::Stale(_) => None,
        }
    }

    /// Resolves `@last` against `history`: the newest entry's id.
    #[must_use]
    pub fn resolve_last(history: &History) -> Option<u64> {
        history.last().map(|e| e.id)
    }

    /// Parses a bookmark reference like `@3` or `@last` against `history`.
    #[must_use]
    pub fn resolve_reference(&self, reference: &str, history: &History) -> Option<u64> {
        let body = reference.strip_prefix('@')?;
        if body == "last" {
            return Self::resolve_last(history);
        }
        body.parse::<u32>().ok().and_then(|slot| self.resolve(slot))
    }

    /// Marks, rather than drops, every bookmark whose target history id is
    /// no longer retained in `history` (§4.11.3 "stale detection on
    /// eviction"). A bookmark once marked stale stays stale even if a
    /// later entry happens to reuse its slot's old id.
    pub fn prune_stale(&mut self, history: &History) {
        for slot in self.slots.values_mut() {
            if let Slot::Live(id) = *slot {
                if history.by_id(id).is_none() {
                    *slot = Slot::Stale(id);
                }
            }
        }
    }

    /// Every bookmark, in slot order, as `(slot, history_id, stale)`.
    #[must_use]
    pub fn list(&self) -> Vec<(u32, u64, bool)> {
        self.slots
            .iter()
            .map(|(slot, s)| (*slot, s.history_id(), matches!(s, Slot::Stale(_))))
            .collect()
    }
}
