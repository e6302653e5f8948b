// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end Debug Tap command round-trip over a real Unix socket.

use std::time::Duration;

use mqtt_pool_lib::debug_tap::{ClientCommand, CommandHandler, CommandOutcome, DebugTap};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

struct AcceptingHandler;

impl CommandHandler for AcceptingHandler {
    fn handle(&self, command: &str, _args: &serde_json::Map<String, Value>) -> CommandOutcome {
        CommandOutcome::ok(serde_json::json!({ "command": command }))
    }
}

/// Shell sends `{"type":"command","command":"mqtt_publish","args":{...}}`;
/// host callback returns `{success:true}` => server responds with a
/// `"response"` record carrying `metadata.command == "mqtt_publish"` and
/// `metadata.success == true` over the same connection; the command
/// counter for `mqtt_publish` reaches 1.
#[tokio::test]
async fn scenario_s6_command_round_trip() {
    let socket_path = std::env::temp_dir().join(format!("mqtt_pool_lib-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&socket_path);

    let mut tap = DebugTap::new(socket_path.clone(), true);
    assert!(tap.is_enabled());
    tap.set_handler(AcceptingHandler);

    let socket_path_for_client = socket_path.clone();
    let client = tokio::spawn(async move {
        // Give the server a moment to be ready to accept.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stream = UnixStream::connect(&socket_path_for_client).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut greeting = String::new();
        reader.read_line(&mut greeting).await.unwrap();

        let command = ClientCommand::Command {
            command: "mqtt_publish".to_string(),
            args: serde_json::Map::from_iter([
                ("topic".to_string(), Value::String("t".to_string())),
                ("message".to_string(), Value::String("m".to_string())),
                ("qos".to_string(), Value::from(0)),
            ]),
        };
        let mut line = serde_json::to_string(&command).unwrap();
        line.push('\n');
        write_half.write_all(line.as_bytes()).await.unwrap();

        let mut reply = String::new();
        reader.read_line(&mut reply).await.unwrap();
        reply
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        tap.tick().await;
        if client.is_finished() || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let reply_line = client.await.unwrap();
    let reply: Value = serde_json::from_str(reply_line.trim_end()).unwrap();
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["metadata"]["command"], "mqtt_publish");
    assert_eq!(reply["metadata"]["success"], true);
    assert_eq!(*tap.command_counts().get("mqtt_publish").unwrap(), 1);

    tap.shutdown().await;
    let _ = std::fs::remove_file(&socket_path);
}
