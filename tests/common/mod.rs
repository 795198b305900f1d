//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::{
    extract::Request,
    routing::get,
    Json, Router,
};
use fleet_sdk::FleetClient;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use worker_fleet::config::{FleetConfig, Mode};
use worker_fleet::health::{HttpMemberClient, SpawnError, Spawner};
use worker_fleet::http::local::placeholder;
use worker_fleet::registry::WorkerRegistry;
use worker_fleet::worker::Deregistration;
use worker_fleet::{Node, Shutdown};

/// A node serving on an ephemeral local port.
pub struct Running {
    pub addr: SocketAddr,
    pub url: String,
    pub registry: Arc<WorkerRegistry>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl Running {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the node to stop serving.
    pub async fn stopped(self, within: Duration) {
        tokio::time::timeout(within, self.handle)
            .await
            .expect("node did not stop in time")
            .unwrap()
            .unwrap();
    }
}

pub async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

pub fn master_config() -> FleetConfig {
    let mut config = FleetConfig::for_mode(Mode::Master);
    config.listener.bind_address = "127.0.0.1:0".into();
    config.health_check.timeout_ms = 500;
    config.drain.poll_interval_ms = 50;
    config
}

pub fn worker_config() -> FleetConfig {
    let mut config = FleetConfig::for_mode(Mode::Worker);
    config.drain.poll_interval_ms = 50;
    config
}

pub async fn start_master(config: FleetConfig, spawner: Arc<dyn Spawner>) -> Running {
    let (listener, addr) = bind().await;
    start_master_on(listener, addr, config, spawner)
}

pub fn start_master_on(
    listener: TcpListener,
    addr: SocketAddr,
    config: FleetConfig,
    spawner: Arc<dyn Spawner>,
) -> Running {
    let client = Arc::new(HttpMemberClient::new(
        &config.health_check.path,
        config.health_check.timeout(),
        config.timeouts.connect(),
    ));
    let node = Node::master(&config, client, spawner, placeholder("master"));
    let registry = node.registry().clone();
    let shutdown = node.shutdown().clone();
    let handle = tokio::spawn(node.serve(listener));

    Running {
        addr,
        url: format!("http://{}", addr),
        registry,
        shutdown,
        handle,
    }
}

/// Start a worker whose data plane is built from its own address.
pub async fn start_worker<F>(local: F) -> Running
where
    F: FnOnce(String) -> Router,
{
    start_worker_inner(None, local).await
}

/// Like [`start_worker`], but the worker leaves `master_url`'s ring when it drains.
pub async fn start_worker_for<F>(master_url: &str, local: F) -> Running
where
    F: FnOnce(String) -> Router,
{
    start_worker_inner(Some(master_url), local).await
}

async fn start_worker_inner<F>(master_url: Option<&str>, local: F) -> Running
where
    F: FnOnce(String) -> Router,
{
    let (listener, addr) = bind().await;
    let mut config = worker_config();
    let deregistration = master_url.map(|url| {
        config.registration.master_url = url.to_string();
        Deregistration::new(&config.registration, "127.0.0.1", addr.port()).unwrap()
    });
    let node = Node::worker(&config, local(addr.to_string()), deregistration);
    let registry = node.registry().clone();
    let shutdown = node.shutdown().clone();
    let handle = tokio::spawn(node.serve(listener));

    Running {
        addr,
        url: format!("http://{}", addr),
        registry,
        shutdown,
        handle,
    }
}

/// Register `worker` with the master at `master_url`.
pub async fn join(master_url: &str, worker: &Running) {
    FleetClient::new(master_url)
        .register("127.0.0.1", worker.port())
        .await
        .unwrap();
}

/// Data plane that reports who served the request and the request ID it saw.
pub fn echo(node: String) -> Router {
    Router::new().fallback(move |request: Request| async move {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Json(json!({
            "node": node,
            "path": request.uri().path(),
            "request_id": request_id,
        }))
    })
}

/// Echo data plane plus a `/slow` route that takes `delay` to answer.
pub fn slow(delay: Duration) -> impl FnOnce(String) -> Router {
    move |node| {
        echo(node).route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(delay).await;
                "done"
            }),
        )
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Spawner for tests that must never launch anything.
pub struct NoSpawn;

impl Spawner for NoSpawn {
    fn spawn_worker(&self) -> Result<(), SpawnError> {
        Ok(())
    }
}

/// Spawner that only counts how often it was asked to launch.
#[derive(Default)]
pub struct CountingSpawner {
    launched: std::sync::atomic::AtomicUsize,
}

impl CountingSpawner {
    pub fn launched(&self) -> usize {
        self.launched.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Spawner for CountingSpawner {
    fn spawn_worker(&self) -> Result<(), SpawnError> {
        self.launched.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Spawner that starts workers inside the test process and registers them.
#[derive(Default)]
pub struct InProcessSpawner {
    master_url: OnceLock<String>,
    pub workers: Arc<Mutex<Vec<Running>>>,
    pub launched: std::sync::atomic::AtomicUsize,
}

impl InProcessSpawner {
    pub fn set_master(&self, url: String) {
        let _ = self.master_url.set(url);
    }

    pub fn launched(&self) -> usize {
        self.launched.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Spawner for InProcessSpawner {
    fn spawn_worker(&self) -> Result<(), SpawnError> {
        let master = self.master_url.get().cloned().unwrap_or_default();
        let workers = self.workers.clone();
        self.launched.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::spawn(async move {
            let worker = start_worker(echo).await;
            join(&master, &worker).await;
            workers.lock().unwrap().push(worker);
        });
        Ok(())
    }
}

/// Poll `check` until it holds or `within` passes.
pub async fn eventually<F>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
