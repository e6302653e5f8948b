// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event Bus Surface (§4.5): event shapes, the broadcast bus, and the
//! built-in listeners that react to them.

mod bus;
mod dispatcher;
mod listeners;
mod types;

pub use bus::EventBus;
pub use dispatcher::EventDispatcher;
pub use listeners::{
    AfterWorkerStartListener, Listener, OnDisconnectListener, OnReceiveListener, PublishListener,
    SubscribeListener,
};
pub use types::{
    DisconnectType, MqttEvent, OnDisconnectEvent, OnPublishEvent, OnReceiveEvent, OnSubscribeEvent,
    OperationResult, Properties, PublishEvent, SubscribeEvent,
};
