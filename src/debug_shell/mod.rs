// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug Shell (§4.11): the companion interactive client that attaches to
//! a [`crate::debug_tap::DebugTap`] socket, keeps a filtered, steppable
//! history of traffic, and offers stats/export tooling over it.

pub mod bookmarks;
pub mod export;
pub mod filter;
pub mod format;
pub mod history;
pub mod jpath;
pub mod stats;
pub mod step;

use bookmarks::Bookmarks;
use filter::FilterExpr;
use history::{Direction, History, HistoryEntry};
use step::{DisplayMode, StepController};

use crate::debug_tap::DebugMessage;

/// Default history capacity, matching the literal boundary test fixture
/// used throughout this module (§4.11.2).
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// The shell's in-memory session state: history, the active display
/// filter, bookmarks, and the step controller.
pub struct Session {
    history: History,
    bookmarks: Bookmarks,
    step: StepController,
    active_filter: Option<FilterExpr>,
}

impl Session {
    /// Creates a session with a history bounded to `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { history: History::new(capacity), bookmarks: Bookmarks::new(), step: StepController::new(), active_filter: None }
    }

    /// Read-only access to the history buffer.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Read-only access to bookmarks.
    #[must_use]
    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    /// Current display mode.
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.step.mode()
    }

    /// Sets the active `where` filter used to decide what streaming mode
    /// displays (breakpoints are independent; see [`Self::add_breakpoint`]).
    pub fn set_filter(&mut self, expr: Option<FilterExpr>) {
        self.active_filter = expr;
    }

    /// Adds a breakpoint expression (§4.11.4).
    pub fn add_breakpoint(&mut self, expr: FilterExpr) {
        self.step.add_breakpoint(expr);
    }

    /// Records `message`/`direction` into history and decides whether it
    /// should be displayed right now. Always accumulates into history;
    /// only the return value governs live display (§4.11.2, §4.11.4).
    pub fn ingest(&mut self, message: DebugMessage, direction: Direction) -> (u64, bool) {
        let id = self.history.push(message, direction);
        self.bookmarks.prune_stale(&self.history);
        let entry = self.history.by_id(id).expect("just inserted");
        let step_allows = self.step.observe(entry);
        let filter_allows = self.active_filter.as_ref().is_none_or(|f| f.matches(entry));
        (id, step_allows && filter_allows)
    }

    /// Resolves a reference like `@3`, `@last`, or a bare numeric history
    /// id string, to the matching entry.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<&HistoryEntry> {
        if let Some(id) = self.bookmarks.resolve_reference(reference, &self.history) {
            return self.history.by_id(id);
        }
        reference.parse::<u64>().ok().and_then(|id| self.history.by_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> DebugMessage {
        DebugMessage {
            kind: "publish".to_string(),
            payload: serde_json::json!({ "topic": topic }),
            source: format!("mqtt:{topic}"),
            timestamp: chrono::Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    #[test]
    fn ingest_always_accumulates_into_history() {
        let mut session = Session::new(10);
        session.set_filter(Some(filter::parse("topic = 'nope'").unwrap()));
        let (id, displayed) = session.ingest(message("a/b"), Direction::Inbound);
        assert!(!displayed);
        assert!(session.history().by_id(id).is_some());
    }

    #[test]
    fn bookmark_and_last_reference_resolve() {
        let mut session = Session::new(10);
        let (id, _) = session.ingest(message("a/b"), Direction::Inbound);
        assert_eq!(session.resolve("@last").unwrap().id, id);
        assert_eq!(session.resolve(&id.to_string()).unwrap().id, id);
    }
}
