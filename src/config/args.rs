//! Command-line arguments.
//!
//! Flags override the matching config-file values. A spawned worker receives
//! `--mode worker --master <url> --bind <addr>` plus the master's `--config`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{FleetConfig, Mode};

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "worker-fleet")]
#[command(about = "Self-managing fleet of request-handling workers behind one master", long_about = None)]
pub struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Role of this process.
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Expected number of workers (master only).
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Master base URL to register with (worker only).
    #[arg(long)]
    pub master: Option<String>,

    /// Listener bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Write every flag that was given into `config`.
    pub fn apply(&self, config: &mut FleetConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(workers) = self.workers {
            config.fleet.expected_workers = workers;
        }
        if let Some(master) = &self.master {
            config.registration.master_url = master.clone();
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}
