//! Worker fleet
//!
//! One master process accepts traffic and proxies each request to the
//! worker that owns its key on a consistent hash ring. The master keeps the
//! fleet at its expected size: it probes workers, evicts the dead, drains
//! the surplus and spawns replacements.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────── MASTER ───────────────────────────┐
//!                    │                                                             │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌────────┐   ┌───────────┐   │
//!   ─────────────────┼─▶│  http   │──▶│  proxy   │──▶│  ring  │──▶│  forward  │───┼──▶ Worker
//!                    │  │ server  │   │ key.rs   │   │ lookup │   │           │   │
//!                    │  └─────────┘   └──────────┘   └───▲────┘   └───────────┘   │
//!                    │                                   │                         │
//!                    │  /worker/register ──────────▶ registry ◀──── health loop    │
//!                    │                                              probe / evict  │
//!                    │                                              drain / spawn ──┼──▶ new Worker
//!                    │                                                             │
//!                    │  /offline, SIGTERM ─▶ lifecycle drain ─▶ shutdown           │
//!                    └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A worker runs the same binary with `--mode worker`: it binds a local port,
//! serves the data plane plus `/health` and `/offline`, and registers itself
//! with the master.

use clap::Parser;

use worker_fleet::config::{resolve, Args};
use worker_fleet::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve(&args)?;

    logging::init(&config.observability.log_level);
    tracing::info!(mode = %config.mode, "worker-fleet v{} starting", env!("CARGO_PKG_VERSION"));

    worker_fleet::run(config, args.config.as_deref()).await?;
    Ok(())
}
