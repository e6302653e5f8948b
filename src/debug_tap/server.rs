// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debug Tap Server (§4.10): a stream-socket endpoint broadcasting events
//! and accepting commands, ticked non-blockingly by the host's main loop.
//!
//! Grounded on the teacher's `protocol::broker_pool::handle_pooled_mqtt_events`
//! cooperative poll-loop idiom, adapted from an owned `tokio::spawn` loop
//! into a `tick()` method the host calls repeatedly — per `spec.md` §9's
//! note that the tap "may not block" and must not own its own task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use super::message::{ClientCommand, DebugMessage};
use crate::event::MqttEvent;

/// Outcome of a delegated or internally handled command (§4.10, §6).
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Whether the command succeeded.
    pub success: bool,
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Optional structured payload.
    pub data: Value,
}

impl CommandOutcome {
    /// A bare success outcome with no payload.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self { success: true, message: None, data }
    }

    /// A failure outcome with a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()), data: Value::Null }
    }
}

/// Host-supplied handler for `mqtt_*` and other non-`stats` commands.
pub trait CommandHandler: Send + Sync {
    /// Executes `command` with `args` and returns its outcome.
    fn handle(&self, command: &str, args: &serde_json::Map<String, Value>) -> CommandOutcome;
}

struct AttachedClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    line: String,
}

impl AttachedClient {
    fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self { reader: BufReader::new(read_half), writer: write_half, line: String::new() }
    }

    async fn send(&mut self, message: &DebugMessage) -> std::io::Result<()> {
        let mut json = serde_json::to_string(message).unwrap_or_default();
        json.push('\n');
        self.writer.write_all(json.as_bytes()).await
    }

    /// Attempts to read one newline-delimited command without blocking
    /// past `budget`.
    async fn try_read_line(&mut self, budget: Duration) -> Option<std::io::Result<Option<String>>> {
        self.line.clear();
        match tokio::time::timeout(budget, self.reader.read_line(&mut self.line)).await {
            Ok(Ok(0)) => Some(Ok(None)), // EOF
            Ok(Ok(_)) => Some(Ok(Some(self.line.trim_end().to_string()))),
            Ok(Err(e)) => Some(Err(e)),
            Err(_) => None, // nothing available within the tick's budget
        }
    }
}

/// Stream-socket debug server (§4.10).
pub struct DebugTap {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: Vec<AttachedClient>,
    command_counts: HashMap<String, u64>,
    handler: Option<Box<dyn CommandHandler>>,
    history_len_provider: Option<Box<dyn Fn() -> usize + Send + Sync>>,
}

impl DebugTap {
    /// Creates a tap. When `enabled` is false, every method becomes a
    /// no-op (§4.10 "must not be enabled unless a configuration flag is
    /// set"). A bind failure on an enabled tap disables it but does not
    /// fail construction.
    pub fn new(socket_path: impl Into<PathBuf>, enabled: bool) -> Self {
        let socket_path = socket_path.into();
        let listener = if enabled { Self::bind(&socket_path) } else { None };
        Self {
            socket_path,
            listener,
            clients: Vec::new(),
            command_counts: HashMap::new(),
            handler: None,
            history_len_provider: None,
        }
    }

    fn bind(path: &Path) -> Option<UnixListener> {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
        match UnixListener::bind(path) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "debug tap bind failed; tap disabled");
                None
            }
        }
    }

    /// Whether the tap is actively listening.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.listener.is_some()
    }

    /// Installs the host callback for delegated commands.
    pub fn set_handler(&mut self, handler: impl CommandHandler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Installs a callback the `stats` command uses to report the current
    /// debug-shell-side history length, when the host wires one in.
    pub fn set_history_len_provider(&mut self, provider: impl Fn() -> usize + Send + Sync + 'static) {
        self.history_len_provider = Some(Box::new(provider));
    }

    /// Number of attached clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Total commands received per command name.
    #[must_use]
    pub fn command_counts(&self) -> &HashMap<String, u64> {
        &self.command_counts
    }

    /// Performs one non-blocking accept and one non-blocking read burst
    /// per attached client. Safe to call on every host main-loop turn.
    pub async fn tick(&mut self) {
        if !self.is_enabled() {
            return;
        }

        if let Some(listener) = &self.listener
            && let Ok(Ok((stream, _))) = tokio::time::timeout(Duration::ZERO, listener.accept()).await
        {
            let mut client = AttachedClient::new(stream);
            if client.send(&DebugMessage::system("attached to debug tap")).await.is_ok() {
                debug!("debug tap client attached");
                self.clients.push(client);
            }
        }

        let mut dead = Vec::new();
        for index in 0..self.clients.len() {
            match self.clients[index].try_read_line(Duration::ZERO).await {
                Some(Ok(Some(line))) if !line.is_empty() => {
                    self.handle_line(index, &line).await;
                }
                Some(Ok(Some(_))) | None => {}
                Some(Ok(None)) | Some(Err(_)) => dead.push(index),
            }
        }
        for index in dead.into_iter().rev() {
            self.clients.remove(index);
        }
    }

    async fn handle_line(&mut self, index: usize, line: &str) {
        let Ok(command) = serde_json::from_str::<ClientCommand>(line) else {
            warn!(line, "malformed debug tap command ignored");
            return;
        };
        match command {
            ClientCommand::Ping => {
                let _ = self.clients[index].send(&DebugMessage::system("pong")).await;
            }
            ClientCommand::Subscribe | ClientCommand::Unsubscribe => {
                // Informational toggles handled client-side; streaming continues.
            }
            ClientCommand::Command { command, args } => {
                *self.command_counts.entry(command.clone()).or_insert(0) += 1;
                let outcome = self.run_command(&command, &args);
                let message = DebugMessage::response(&command, outcome.success, outcome.message, outcome.data);
                let _ = self.clients[index].send(&message).await;
            }
        }
    }

    fn run_command(&self, command: &str, args: &serde_json::Map<String, Value>) -> CommandOutcome {
        if command == "stats" {
            let history_len = self.history_len_provider.as_ref().map_or(0, |f| f());
            return CommandOutcome::ok(serde_json::json!({
                "clients": self.clients.len(),
                "history_len": history_len,
                "commands": self.command_counts,
            }));
        }
        self.handler
            .as_ref()
            .map_or_else(|| CommandOutcome::failure(format!("unknown command: {command}")), |h| h.handle(command, args))
    }

    /// Forwards `event` to every attached client, if it maps to a Debug
    /// Message (§4.5 "DebugTapListener").
    pub async fn broadcast(&mut self, event: &MqttEvent) {
        if !self.is_enabled() {
            return;
        }
        let Some(message) = DebugMessage::from_event(event) else {
            return;
        };
        let mut dead = Vec::new();
        for (index, client) in self.clients.iter_mut().enumerate() {
            if client.send(&message).await.is_err() {
                dead.push(index);
            }
        }
        for index in dead.into_iter().rev() {
            self.clients.remove(index);
        }
    }

    /// Closes every client connection and removes the endpoint file.
    pub async fn shutdown(&mut self) {
        self.clients.clear();
        self.listener = None;
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    impl CommandHandler for EchoHandler {
        fn handle(&self, command: &str, _args: &serde_json::Map<String, Value>) -> CommandOutcome {
            CommandOutcome::ok(serde_json::json!({ "echoed": command }))
        }
    }

    #[test]
    fn disabled_tap_has_no_listener() {
        let tap = DebugTap::new("/tmp/does-not-matter.sock", false);
        assert!(!tap.is_enabled());
    }

    #[test]
    fn stats_command_reports_client_count() {
        let tap = DebugTap::new("/tmp/does-not-matter-2.sock", false);
        let outcome = tap.run_command("stats", &serde_json::Map::new());
        assert!(outcome.success);
        assert_eq!(outcome.data["clients"], 0);
    }

    #[test]
    fn unknown_command_without_handler_fails() {
        let tap = DebugTap::new("/tmp/does-not-matter-3.sock", false);
        let outcome = tap.run_command("mqtt_publish", &serde_json::Map::new());
        assert!(!outcome.success);
    }

    #[test]
    fn delegated_command_uses_handler() {
        let mut tap = DebugTap::new("/tmp/does-not-matter-4.sock", false);
        tap.set_handler(EchoHandler);
        let outcome = tap.run_command("mqtt_publish", &serde_json::Map::new());
        assert!(outcome.success);
        assert_eq!(outcome.data["echoed"], "mqtt_publish");
    }
}
