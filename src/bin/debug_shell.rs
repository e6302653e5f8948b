// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive companion to [`mqtt_pool_lib::debug_tap`] (§4.11): attaches
//! to a running Debug Tap socket, accumulates a filtered, steppable
//! history of traffic, and offers stats/export commands over it.

use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mqtt_pool_lib::debug_shell::format::Formatter;
use mqtt_pool_lib::debug_shell::history::Direction;
use mqtt_pool_lib::debug_shell::{DEFAULT_HISTORY_CAPACITY, Session, export, filter, stats};
use mqtt_pool_lib::debug_tap::{ClientCommand, DebugMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{error, info};

const TOOL_VERSION: &str = "0.1.0";

#[derive(Parser)]
#[command(name = "mqtt-debug-shell", version = TOOL_VERSION, about = "Interactive Debug Tap client")]
struct Cli {
    /// Path to the Debug Tap unix socket.
    #[arg(short, long, default_value = "/tmp/mqtt_pool_lib-debug.sock")]
    socket: PathBuf,
    /// History capacity to retain in this session.
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,
    /// `where`-clause filter applied to the live stream at startup.
    #[arg(long)]
    filter: Option<String>,
    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attaches and streams traffic until interrupted (the default).
    Watch,
    /// Sends a single `ping` and exits.
    Ping,
    /// Sends a named command with JSON args and prints the response.
    Command {
        /// Command name, e.g. `mqtt_pool_status`.
        name: String,
        /// Raw JSON object of extra arguments.
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Watches traffic, then prints aggregate stats on Ctrl-C.
    Stats,
    /// Watches traffic, then exports the accumulated history on Ctrl-C.
    Export {
        /// Output format.
        #[arg(long, default_value = "json")]
        format: String,
        /// Maximum number of entries to export.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Evaluates a dotted JSON path against one JSON value and exits,
    /// without attaching to a tap (useful for testing a path offline).
    Jpath {
        /// Dotted path, e.g. `$.items[*].value`.
        path: String,
        /// JSON document to evaluate the path against.
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Some(Commands::Jpath { path, json }) = &cli.cmd {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let results = mqtt_pool_lib::debug_shell::jpath::evaluate(&value, path);
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let stream = UnixStream::connect(&cli.socket).await.map_err(|e| {
        error!(socket = %cli.socket.display(), error = %e, "failed to attach to debug tap");
        e
    })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    match cli.cmd.unwrap_or(Commands::Watch) {
        Commands::Ping => {
            send_command(&mut write_half, &ClientCommand::Ping).await?;
            print_one_reply(&mut reader).await?;
        }
        Commands::Command { name, args } => {
            let args: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&args)?;
            send_command(&mut write_half, &ClientCommand::Command { command: name, args }).await?;
            print_one_reply(&mut reader).await?;
        }
        Commands::Watch => {
            watch(&mut reader, cli.history_capacity, cli.filter, WatchOutcome::Stream).await?;
        }
        Commands::Stats => {
            watch(&mut reader, cli.history_capacity, cli.filter, WatchOutcome::Stats).await?;
        }
        Commands::Export { format, limit } => {
            watch(&mut reader, cli.history_capacity, cli.filter, WatchOutcome::Export { format, limit }).await?;
        }
    }

    Ok(())
}

enum WatchOutcome {
    Stream,
    Stats,
    Export { format: String, limit: Option<usize> },
}

async fn send_command(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    command: &ClientCommand,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(command).unwrap_or_default();
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

async fn print_one_reply(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
) -> std::io::Result<()> {
    let mut line = String::new();
    reader.read_line(&mut line).await?; // greeting
    line.clear();
    reader.read_line(&mut line).await?; // reply
    println!("{}", line.trim_end());
    Ok(())
}

async fn watch(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
    history_capacity: usize,
    filter_expr: Option<String>,
    outcome: WatchOutcome,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::new(history_capacity);
    if let Some(expr) = filter_expr {
        match filter::parse(&expr) {
            Ok(expr) => session.set_filter(Some(expr)),
            Err(e) => error!(error = %e, "ignoring malformed --filter"),
        }
    }

    let stdout = std::io::stdout();
    let mut line = String::new();
    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                let bytes_read = result?;
                if bytes_read == 0 {
                    info!("debug tap closed the connection");
                    break;
                }
                let Ok(message) = serde_json::from_str::<DebugMessage>(line.trim_end()) else {
                    continue;
                };
                let direction = infer_direction(&message);
                let (id, displayed) = session.ingest(message, direction);
                if matches!(outcome, WatchOutcome::Stream) && displayed {
                    let entry = session.history().by_id(id).expect("just inserted");
                    let mut out = stdout.lock();
                    let _ = writeln!(out, "{}", mqtt_pool_lib::debug_shell::format::render(entry, Formatter::Compact));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; finishing up");
                break;
            }
        }
    }

    match outcome {
        WatchOutcome::Stream => {}
        WatchOutcome::Stats => {
            let computed = stats::compute(session.history());
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "by_topic": computed.by_topic,
                "inbound": computed.inbound_count,
                "outbound": computed.outbound_count,
                "latencies_ms": computed.latencies_ms,
            }))?);
            println!("{}", stats::topic_tree(session.history()));
        }
        WatchOutcome::Export { format, limit } => {
            let rendered = if format == "csv" {
                export::to_csv(session.history(), limit)
            } else {
                export::to_json(session.history(), limit)
            };
            println!("{rendered}");
        }
    }
    Ok(())
}

fn infer_direction(message: &DebugMessage) -> Direction {
    // The wire record doesn't distinguish request vs. acknowledgement
    // side; a `publish` record whose source names a topic we're actively
    // subscribed to reads as inbound, everything else as outbound. A
    // heuristic default, refined by `direction` commands issued in-shell.
    if message.kind == "publish" { Direction::Inbound } else { Direction::Outbound }
}
