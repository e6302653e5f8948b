// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Step Controller (§4.11.4): streaming vs. step-through display, with
//! breakpoints expressed as filter expressions that auto-pause streaming.

use super::filter::FilterExpr;
use super::history::HistoryEntry;

/// How newly arrived messages are surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Every arriving message is displayed immediately (subject to the
    /// active filter).
    Streaming,
    /// Arriving messages accumulate in history but are not displayed
    /// until `next`/`continue` is invoked.
    Step,
}

/// Tracks display mode, pending step-mode backlog, and breakpoints.
///
/// Messages always accumulate into history regardless of display mode
/// (§4.11.4): this controller only decides what gets echoed live.
#[derive(Debug)]
pub struct StepController {
    mode: DisplayMode,
    breakpoints: Vec<FilterExpr>,
    pending: Vec<u64>,
}

impl StepController {
    /// Creates a controller starting in streaming mode with no
    /// breakpoints.
    #[must_use]
    pub fn new() -> Self {
        Self { mode: DisplayMode::Streaming, breakpoints: Vec::new(), pending: Vec::new() }
    }

    /// Current display mode.
    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Switches to step mode.
    pub fn enter_step(&mut self) {
        self.mode = DisplayMode::Step;
    }

    /// Switches to streaming mode, discarding any step-mode backlog.
    pub fn enter_streaming(&mut self) {
        self.mode = DisplayMode::Streaming;
        self.pending.clear();
    }

    /// Registers a breakpoint expression; a matching message in streaming
    /// mode switches the controller into step mode automatically.
    pub fn add_breakpoint(&mut self, expr: FilterExpr) {
        self.breakpoints.push(expr);
    }

    /// Clears every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Notifies the controller that `entry` was just appended to history.
    /// Returns whether it should be displayed immediately.
    pub fn observe(&mut self, entry: &HistoryEntry) -> bool {
        let hit_breakpoint = self.breakpoints.iter().any(|bp| bp.matches(entry));
        match self.mode {
            DisplayMode::Streaming => {
                if hit_breakpoint {
                    self.mode = DisplayMode::Step;
                }
                !hit_breakpoint
            }
            DisplayMode::Step => {
                self.pending.push(entry.id);
                false
            }
        }
    }

    /// Pops the oldest pending id in step mode (the `next` command).
    pub fn next(&mut self) -> Option<u64> {
        if self.pending.is_empty() { None } else { Some(self.pending.remove(0)) }
    }

    /// Drains every pending id in step mode (the `continue` command),
    /// returning to streaming mode.
    pub fn continue_all(&mut self) -> Vec<u64> {
        let drained = std::mem::take(&mut self.pending);
        self.mode = DisplayMode::Streaming;
        drained
    }

    /// How many messages are waiting to be stepped through.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}
