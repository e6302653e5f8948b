// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug Tap (§4.10): a newline-delimited JSON stream-socket endpoint that
//! forwards bus events and accepts a small command protocol, for the
//! companion Debug Shell to attach to.

mod listener;
mod message;
mod server;

pub use listener::DebugTapListener;
pub use message::{ClientCommand, DebugMessage};
pub use server::{CommandHandler, CommandOutcome, DebugTap};
