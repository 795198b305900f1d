//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a fleet node.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which side of the fleet this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Accepts external traffic, owns membership, runs the health loop.
    #[default]
    Master,
    /// Serves traffic routed to it by a master.
    Worker,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Master => f.write_str("master"),
            Mode::Worker => f.write_str("worker"),
        }
    }
}

/// Root configuration for a fleet node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FleetConfig {
    pub mode: Mode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Fleet sizing and ring shape.
    pub fleet: FleetSection,

    /// Health probing of members.
    pub health_check: HealthCheckConfig,

    /// Graceful drain behaviour.
    pub drain: DrainConfig,

    /// How a worker announces itself to the master.
    pub registration: RegistrationConfig,

    /// How the master starts new workers.
    pub spawn: SpawnConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl FleetConfig {
    /// Defaults appropriate for `mode` (a worker binds an ephemeral local port).
    pub fn for_mode(mode: Mode) -> Self {
        let mut config = Self {
            mode,
            ..Self::default()
        };
        if mode == Mode::Worker {
            config.listener.bind_address = DEFAULT_WORKER_BIND.to_string();
        }
        config
    }
}

pub const DEFAULT_MASTER_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_WORKER_BIND: &str = "127.0.0.1:0";

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000"). Port 0 lets the OS pick.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_MASTER_BIND.to_string(),
        }
    }
}

/// What the router hashes to pick a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingKeySource {
    /// The request's Host header (or URI authority).
    #[default]
    Host,
    /// The peer IP of the client connection.
    ClientIp,
}

/// Fleet sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FleetSection {
    /// Number of workers the master keeps alive.
    pub expected_workers: usize,

    /// Ring positions per worker.
    pub virtual_nodes: usize,

    /// Source of the routing key.
    pub routing_key: RoutingKeySource,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            expected_workers: 0,
            virtual_nodes: 50,
            routing_key: RoutingKeySource::Host,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Pause between the end of one reconciliation tick and the next.
    pub interval_secs: u64,

    /// Deadline for a single probe attempt in milliseconds.
    pub timeout_ms: u64,

    /// Probe attempts per member per tick before the member counts as failed.
    pub probe_attempts: u32,

    /// Consecutive failed ticks before a member is evicted.
    pub failure_threshold: u32,

    /// Path to probe on each member.
    pub path: String,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_ms: 2000,
            probe_attempts: 3,
            failure_threshold: 1,
            path: "/health".to_string(),
        }
    }
}

/// Graceful drain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DrainConfig {
    /// How often a draining node checks its in-flight counter.
    pub poll_interval_ms: u64,

    /// Give up waiting after this long. `None` waits forever.
    pub timeout_secs: Option<u64>,

    /// Attempts per member when the master broadcasts a drain.
    pub broadcast_attempts: u32,
}

impl DrainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            timeout_secs: None,
            broadcast_attempts: 3,
        }
    }
}

/// Worker registration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Base URL of the master.
    pub master_url: String,

    /// Registration attempts before the worker gives up and exits.
    pub attempts: u32,

    /// Wait between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Host to advertise. Auto-detected when unset.
    pub advertise_host: Option<String>,
}

impl RegistrationConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            master_url: "http://127.0.0.1:3000".to_string(),
            attempts: 3,
            retry_delay_ms: 10_000,
            advertise_host: None,
        }
    }
}

/// Worker process launch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpawnConfig {
    /// Program to run. Defaults to the current executable.
    pub program: Option<String>,

    /// Extra arguments placed before the generated `--mode`/`--master` flags.
    pub extra_args: Vec<String>,

    /// Bind address handed to spawned workers.
    pub worker_bind: String,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            program: None,
            extra_args: Vec::new(),
            worker_bind: DEFAULT_WORKER_BIND.to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout towards workers in seconds.
    pub connect_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_secs: 5 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: FleetConfig = toml::from_str("[fleet]\nexpected_workers = 4\n").unwrap();
        assert_eq!(config.mode, Mode::Master);
        assert_eq!(config.fleet.expected_workers, 4);
        assert_eq!(config.fleet.virtual_nodes, 50);
        assert_eq!(config.health_check.interval(), Duration::from_secs(10));
        assert_eq!(config.health_check.failure_threshold, 1);
        assert!(config.drain.timeout().is_none());
    }

    #[test]
    fn test_full_file() {
        let config: FleetConfig = toml::from_str(
            r#"
            mode = "worker"

            [listener]
            bind_address = "127.0.0.1:0"

            [fleet]
            routing_key = "client_ip"

            [drain]
            timeout_secs = 30

            [registration]
            master_url = "http://10.0.0.1:3000"
            advertise_host = "10.0.0.9"
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Worker);
        assert_eq!(config.fleet.routing_key, RoutingKeySource::ClientIp);
        assert_eq!(config.drain.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.registration.advertise_host.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_worker_defaults_bind_ephemeral() {
        let config = FleetConfig::for_mode(Mode::Worker);
        assert_eq!(config.listener.bind_address, DEFAULT_WORKER_BIND);
    }
}
