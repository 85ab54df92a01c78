//! `ntetris-client`: a line-oriented client for the ntetris server.
//!
//! ```text
//! ntetris-client <host> <port> <displayName>
//! ```
//!
//! Commands are read from stdin, one per line (`help` lists them). Events
//! are printed to stdout; logs go to stderr and are filtered with
//! `RUST_LOG` (default `warn`).
//!
//! The exit status is always 0. Usage problems, an unreachable server and
//! fatal transport faults are reported on stderr, never through the
//! status.

use std::io::BufRead;
use std::process::ExitCode;

use clap::Parser;
use ntetris::prelude::*;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ntetris-client", version, about = "Client for the ntetris multiplayer tetris server")]
struct Args {
    /// Server host name or address.
    host: String,
    /// Server UDP port.
    port: u16,
    /// Name to register with.
    display_name: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Forwards stdin lines on a plain thread; blocking reads don't belong on
/// the runtime. The channel closing is the interpreter's end-of-input.
fn spawn_stdin_reader(lines: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if lines.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage problems are reported, not treated as failures.
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    init_tracing();

    let client = match Client::builder(args.display_name)
        .connect(&args.host, args.port)
        .await
    {
        Ok(client) => client,
        Err(err) => return finish(Err(err)),
    };

    let shutdown = client.shutdown_token();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel();
            }
        }
    });

    let (lines_tx, lines) = mpsc::channel(16);
    spawn_stdin_reader(lines_tx);

    let (events, mut events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{event}");
        }
    });

    let result = client.run(lines, events).await;
    let _ = printer.await;
    finish(result)
}

/// Reports a failed run once, on stderr. The status stays 0 either way.
fn finish(outcome: Result<(), NtetrisError>) -> ExitCode {
    if let Err(err) = outcome {
        eprintln!("error: {err}");
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_success(code: ExitCode) -> bool {
        format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
    }

    #[test]
    fn test_finish_clean_run_exits_zero() {
        assert!(is_success(finish(Ok(()))));
    }

    #[test]
    fn test_finish_unresolvable_host_exits_zero() {
        let err = TransportError::Resolve("nonexistent.invalid:7777".into());
        assert!(is_success(finish(Err(err.into()))));
    }

    #[test]
    fn test_finish_transport_fault_exits_zero() {
        let err = TransportError::ConnectionClosed("socket gone".into());
        assert!(is_success(finish(Err(NtetrisError::Transport(err)))));
    }
}
