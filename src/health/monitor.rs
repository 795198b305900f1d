//! Health and autoscale loop.
//!
//! # Responsibilities
//! - Periodically probe every member and evict the dead
//! - Shrink the fleet down to the expected size by draining random members
//! - Grow the fleet up to the expected size by spawning workers
//!
//! # Design Decisions
//! - Self-rescheduling: the next tick is scheduled only after the previous
//!   one finished, so ticks never overlap however slow the probes are
//! - Spawns are never awaited; a new worker counts only once it registers
//! - Once the master drains, the loop neither shrinks nor grows and stops
//!   at the next opportunity, so a fleet-wide drain is never undone

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::client::MemberClient;
use crate::health::spawner::Spawner;
use crate::lifecycle::{DrainController, ShutdownSignal};
use crate::observability::metrics;
use crate::registry::{WorkerAddr, WorkerRegistry};
use crate::resilience::{retry_until, Backoff};

/// What one reconciliation tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub expected: usize,
    /// Members left after the tick.
    pub live: usize,
    /// Members removed because they failed their probes.
    pub evicted: Vec<WorkerAddr>,
    /// Healthy members removed to shrink the fleet.
    pub drained: Vec<WorkerAddr>,
    pub spawned: usize,
    pub spawn_failures: usize,
}

pub struct HealthMonitor {
    registry: Arc<WorkerRegistry>,
    client: Arc<dyn MemberClient>,
    spawner: Arc<dyn Spawner>,
    expected: usize,
    config: HealthCheckConfig,
    drain_attempts: u32,
    /// This node's own drain state.
    drain: Option<DrainController>,
    /// Consecutive failed ticks per member.
    failures: HashMap<WorkerAddr, u32>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        client: Arc<dyn MemberClient>,
        spawner: Arc<dyn Spawner>,
        expected: usize,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            client,
            spawner,
            expected,
            config,
            drain_attempts: 3,
            drain: None,
            failures: HashMap::new(),
        }
    }

    /// Attempts per member when asking it to drain during a shrink.
    pub fn with_drain_attempts(mut self, attempts: u32) -> Self {
        self.drain_attempts = attempts;
        self
    }

    /// Stop reconciling once `drain` starts.
    pub fn with_drain(mut self, drain: DrainController) -> Self {
        self.drain = Some(drain);
        self
    }

    fn is_draining(&self) -> bool {
        self.drain.as_ref().is_some_and(DrainController::is_draining)
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Launch the initial workers. Called once by the master at startup.
    pub fn bootstrap(&self) -> usize {
        let mut launched = 0;
        for _ in 0..self.expected {
            if self.spawn_one() {
                launched += 1;
            }
        }
        tracing::info!(expected = self.expected, launched, "Initial workers launched");
        launched
    }

    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let interval = self.config.interval();
        tracing::info!(
            interval_secs = interval.as_secs(),
            expected = self.expected,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut draining = self.drain.as_ref().map(DrainController::draining_signal);
        loop {
            tokio::select! {
                _ = time::sleep(interval) => {
                    self.tick().await;
                }
                _ = shutdown.wait() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
                _ = wait_draining(&mut draining) => {
                    tracing::info!("Node is draining, health monitor stopping");
                    break;
                }
            }
        }
    }

    /// One reconciliation pass: probe, evict, shrink, grow.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            expected: self.expected,
            ..TickReport::default()
        };

        self.probe_all(&mut report).await;
        // a drain may have started while probes were out
        if self.is_draining() {
            tracing::debug!("Node is draining, skipping fleet resize");
        } else {
            self.shrink(&mut report).await;
            self.grow(&mut report);
        }

        report.live = self.registry.len();
        metrics::record_fleet_size(self.expected, report.live);
        tracing::info!(
            expected = report.expected,
            live = report.live,
            evicted = report.evicted.len(),
            drained = report.drained.len(),
            spawned = report.spawned,
            spawn_failures = report.spawn_failures,
            "Fleet reconciled"
        );
        report
    }

    async fn probe_all(&mut self, report: &mut TickReport) {
        let members = self.registry.snapshot();
        self.failures.retain(|addr, _| members.contains(addr));

        let this = &*self;
        let results = join_all(members.iter().map(|addr| async move {
            let alive = this.probe_with_retries(addr).await;
            (addr, alive)
        }))
        .await;

        for (addr, alive) in results {
            if alive {
                self.failures.remove(addr);
                continue;
            }

            metrics::record_probe_failure();
            let count = self.failures.entry(addr.clone()).or_insert(0);
            *count += 1;
            if *count < self.config.failure_threshold {
                tracing::warn!(worker = %addr, failures = *count, "Worker failed health probe");
                continue;
            }

            self.failures.remove(addr);
            if self.registry.evict(addr) {
                tracing::warn!(worker = %addr, "Evicting unresponsive worker");
                metrics::record_eviction("unhealthy");
                report.evicted.push(addr.clone());
            }
        }
    }

    async fn probe_with_retries(&self, addr: &WorkerAddr) -> bool {
        let timeout = self.config.timeout();
        retry_until(self.config.probe_attempts, Backoff::None, |_| {
            probe_once(self.client.as_ref(), addr, timeout)
        })
        .await
    }

    async fn shrink(&mut self, report: &mut TickReport) {
        while self.registry.len() > self.expected {
            let Some(victim) = self.registry.random_member() else {
                break;
            };

            // Out of the ring first so no new request lands on it.
            if !self.registry.evict(&victim) {
                continue;
            }
            self.failures.remove(&victim);
            metrics::record_eviction("scale_down");

            let client = self.client.as_ref();
            let acknowledged = retry_until(self.drain_attempts, Backoff::None, |_| {
                client.request_drain(&victim)
            })
            .await;
            if acknowledged {
                tracing::info!(worker = %victim, "Worker drained to shrink fleet");
            } else {
                tracing::warn!(worker = %victim, "Worker did not acknowledge drain, dropped anyway");
            }
            report.drained.push(victim);
        }
    }

    fn grow(&self, report: &mut TickReport) {
        let live = self.registry.len();
        for _ in live..self.expected {
            if self.spawn_one() {
                report.spawned += 1;
            } else {
                report.spawn_failures += 1;
            }
        }
    }

    fn spawn_one(&self) -> bool {
        match self.spawner.spawn_worker() {
            Ok(()) => {
                metrics::record_spawn("ok");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn worker");
                metrics::record_spawn("error");
                false
            }
        }
    }
}

async fn wait_draining(signal: &mut Option<ShutdownSignal>) {
    match signal {
        Some(signal) => signal.wait().await,
        None => std::future::pending().await,
    }
}

async fn probe_once(client: &dyn MemberClient, addr: &WorkerAddr, timeout: Duration) -> bool {
    time::timeout(timeout, client.probe(addr))
        .await
        .unwrap_or(false)
}
