//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener and build every subsystem in dependency order
//! - Master: launch the initial workers and start the health loop
//! - Worker: serve first, then register with the master
//! - Hook OS signals up to the drain
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and ends the process non-zero
//! - The registry is created here and shared, never global

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::{FleetConfig, Mode};
use crate::health::{HealthMonitor, HttpMemberClient, MemberClient, ProcessSpawner, SpawnError, Spawner};
use crate::http::local::placeholder;
use crate::http::{AppState, FleetServer};
use crate::lifecycle::drain::{DrainController, FleetDrain};
use crate::lifecycle::inflight::InFlight;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::registry::{AddressError, WorkerAddr, WorkerRegistry};
use crate::worker::{advertise_host, register_with_master, Deregistration, RegistrationError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("cannot advertise this worker: {0}")]
    Address(#[from] AddressError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A fully wired node, ready to serve.
pub struct Node {
    registry: Arc<WorkerRegistry>,
    shutdown: Shutdown,
    drain: DrainController,
    state: AppState,
    monitor: Option<HealthMonitor>,
}

impl Node {
    /// Master: owns membership, proxies, runs the health loop.
    pub fn master(
        config: &FleetConfig,
        client: Arc<dyn MemberClient>,
        spawner: Arc<dyn Spawner>,
        local: Router,
    ) -> Self {
        let registry = Arc::new(WorkerRegistry::new(config.fleet.virtual_nodes));
        let shutdown = Shutdown::new();
        let fleet = FleetDrain::new(registry.clone(), client.clone(), config.drain.broadcast_attempts);
        let drain = DrainController::new(InFlight::new(), &config.drain, shutdown.clone()).with_fleet(fleet);
        let monitor = HealthMonitor::new(
            registry.clone(),
            client,
            spawner,
            config.fleet.expected_workers,
            config.health_check.clone(),
        )
        .with_drain_attempts(config.drain.broadcast_attempts)
        .with_drain(drain.clone());
        let state = AppState::new(config, registry.clone(), drain.clone(), local);

        Self {
            registry,
            shutdown,
            drain,
            state,
            monitor: Some(monitor),
        }
    }

    /// Worker: serves `local` and answers control calls from its master.
    ///
    /// With `deregistration` set, a drain starts by leaving the master's ring.
    pub fn worker(config: &FleetConfig, local: Router, deregistration: Option<Deregistration>) -> Self {
        let registry = Arc::new(WorkerRegistry::new(config.fleet.virtual_nodes));
        let shutdown = Shutdown::new();
        let mut drain = DrainController::new(InFlight::new(), &config.drain, shutdown.clone());
        if let Some(deregistration) = deregistration {
            drain = drain.with_deregistration(deregistration);
        }
        let state = AppState::new(config, registry.clone(), drain.clone(), local);

        Self {
            registry,
            shutdown,
            drain,
            state,
            monitor: None,
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn drain(&self) -> &DrainController {
        &self.drain
    }

    /// Serve until shutdown. A master first launches its initial workers
    /// and starts the health loop.
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        if let Some(monitor) = self.monitor {
            monitor.bootstrap();
            tokio::spawn(monitor.run(self.shutdown.subscribe()));
        }
        FleetServer::new(self.state)
            .run(listener, self.shutdown.subscribe())
            .await
    }
}

/// Run a node described by `config` until it has drained.
///
/// `config_path` is handed on to spawned workers.
pub async fn run(config: FleetConfig, config_path: Option<&Path>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, mode = %config.mode, "Listening for connections");

    match config.mode {
        Mode::Master => run_master(&config, config_path, listener, local_addr).await,
        Mode::Worker => run_worker(&config, listener, local_addr).await,
    }
}

async fn run_master(
    config: &FleetConfig,
    config_path: Option<&Path>,
    listener: TcpListener,
    local_addr: SocketAddr,
) -> Result<(), StartupError> {
    let master_url = reachable_url(local_addr);
    let spawner = ProcessSpawner::from_config(&config.spawn, &master_url, config_path)?;
    let client = HttpMemberClient::new(
        &config.health_check.path,
        config.health_check.timeout(),
        config.timeouts.connect(),
    );

    tracing::info!(
        expected_workers = config.fleet.expected_workers,
        virtual_nodes = config.fleet.virtual_nodes,
        master_url = %master_url,
        "Master starting"
    );

    let node = Node::master(config, Arc::new(client), Arc::new(spawner), placeholder("master"));
    watch_signals(node.drain().clone(), node.shutdown().clone());
    node.serve(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_worker(
    config: &FleetConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
) -> Result<(), StartupError> {
    let host = advertise_host(config.registration.advertise_host.as_deref(), local_addr.ip());
    let self_addr = WorkerAddr::new(&host, local_addr.port())?;

    let deregistration = Deregistration::new(&config.registration, &host, local_addr.port())?;
    let node = Node::worker(config, placeholder(self_addr.as_str()), Some(deregistration));
    let shutdown = node.shutdown().clone();
    watch_signals(node.drain().clone(), shutdown.clone());
    let server = tokio::spawn(node.serve(listener));

    if let Err(e) = register_with_master(&config.registration, &host, local_addr.port()).await {
        tracing::error!(error = %e, "Giving up on registration");
        shutdown.trigger();
        let _ = server.await;
        return Err(e.into());
    }

    server.await??;
    tracing::info!(worker = %self_addr, "Shutdown complete");
    Ok(())
}

/// First signal drains, a second one stops immediately.
fn watch_signals(drain: DrainController, shutdown: Shutdown) {
    tokio::spawn(async move {
        signals::terminate_signal().await;
        tracing::info!("Shutdown signal received, draining");
        drain.trigger();

        signals::terminate_signal().await;
        tracing::warn!("Second shutdown signal received, exiting without waiting");
        shutdown.trigger();
    });
}

/// URL other local processes can use to reach a listener on `addr`.
fn reachable_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}
