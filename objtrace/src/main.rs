//! # objtrace - Collector Entry Point
//!
//! Listens for tracer agents, queues their event lines and runs the selected
//! processor until Ctrl+C or `--duration` elapses.

// Elapsed time is printed with one decimal
#![allow(clippy::cast_precision_loss)]

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;

use objtrace::cli::Args;
use objtrace::collector::{build_processor, spawn_processor, CollectorServer};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().contains("queue must hold") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    if args.queue == 0 {
        anyhow::bail!("--queue must hold at least one line");
    }

    let server = CollectorServer::bind(&args.listen_addr())
        .await
        .context("Failed to start collector")?;
    let local = server.local_addr()?;
    let server_stats = server.stats();

    if !quiet {
        eprintln!("objtrace v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("listening: {local}");
        eprintln!("processor: {:?}", args.processor);
    }

    // ── Processor thread ────────────────────────────────────────────────
    let (queue_tx, queue_rx) = bounded(args.queue);
    let processor = build_processor(args.processor, Box::new(io::stdout()));
    let processor_handle = spawn_processor(queue_rx, processor);

    // ── Stop on Ctrl+C or after --duration ──────────────────────────────
    let started = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };
    let mut exit_reason = "interrupted";

    let shutdown = async {
        match duration_limit {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    () = tokio::time::sleep(limit) => exit_reason = "duration limit reached",
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    };

    server.serve(queue_tx, shutdown).await;
    info!("Accept loop stopped ({exit_reason})");

    // All senders are gone now; the processor drains what is left and exits.
    let processor_stats = processor_handle
        .join()
        .map_err(|_| anyhow::anyhow!("processor thread panicked"))?;

    if !quiet {
        eprintln!(
            "\n{}: {:.1}s, {} connections, {} lines (dropped: {}, malformed: {}, output errors: {})",
            exit_reason,
            started.elapsed().as_secs_f64(),
            server_stats.connections(),
            server_stats.lines_received(),
            server_stats.lines_dropped(),
            processor_stats.parse_errors,
            processor_stats.output_errors,
        );
    }

    Ok(())
}
