//! Graceful drain.
//!
//! # Responsibilities
//! - Refuse new data-plane work once draining starts
//! - Wait for in-flight requests to reach zero, then trigger shutdown
//! - On the master, tell every member to drain and take it out of the ring
//! - On a worker, ask the master to take it out of the ring first
//!
//! # Design Decisions
//! - Drain starts at most once; later triggers are no-ops
//! - The counter is polled rather than awaited so a stuck request only
//!   delays exit, it never wedges the poller
//! - An optional timeout bounds the wait; without one the node waits for
//!   as long as requests keep running

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::DrainConfig;
use crate::health::MemberClient;
use crate::lifecycle::inflight::InFlight;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal};
use crate::observability::metrics;
use crate::registry::{WorkerAddr, WorkerRegistry};
use crate::resilience::{retry_until, Backoff};
use crate::worker::Deregistration;

/// Drain state of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrainState {
    /// Serving normally.
    Active = 0,
    /// Finishing in-flight work, refusing new work.
    Draining = 1,
    /// Drain finished; shutdown has been triggered.
    Terminated = 2,
}

impl From<u8> for DrainState {
    fn from(v: u8) -> Self {
        match v {
            0 => DrainState::Active,
            1 => DrainState::Draining,
            _ => DrainState::Terminated,
        }
    }
}

/// How waiting for in-flight work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Idle,
    TimedOut { remaining: usize },
}

/// Members the master tells to drain along with itself.
#[derive(Clone)]
pub struct FleetDrain {
    registry: Arc<WorkerRegistry>,
    client: Arc<dyn MemberClient>,
    attempts: u32,
}

impl FleetDrain {
    pub fn new(registry: Arc<WorkerRegistry>, client: Arc<dyn MemberClient>, attempts: u32) -> Self {
        Self {
            registry,
            client,
            attempts,
        }
    }

    /// Tell every current member to drain, then evict it.
    ///
    /// Members that never acknowledge are evicted all the same. Returns the
    /// addresses that were members when the broadcast started.
    pub async fn broadcast(&self) -> Vec<WorkerAddr> {
        let members = self.registry.snapshot();
        let client = self.client.as_ref();

        let results = join_all(members.iter().map(|addr| async move {
            let ok = retry_until(self.attempts, Backoff::None, |_| client.request_drain(addr)).await;
            (addr, ok)
        }))
        .await;

        for (addr, acknowledged) in results {
            if !acknowledged {
                tracing::warn!(worker = %addr, "Worker did not acknowledge drain");
            }
            if self.registry.evict(addr) {
                metrics::record_eviction("fleet_drain");
            }
        }
        tracing::info!(members = members.len(), "Drain broadcast to fleet");
        members
    }
}

/// Owns the drain state of one node.
#[derive(Clone)]
pub struct DrainController {
    state: Arc<AtomicU8>,
    in_flight: InFlight,
    poll_interval: Duration,
    timeout: Option<Duration>,
    /// Fires when draining starts, well before `shutdown`.
    started: Shutdown,
    shutdown: Shutdown,
    fleet: Option<FleetDrain>,
    deregistration: Option<Deregistration>,
}

impl DrainController {
    pub fn new(in_flight: InFlight, config: &DrainConfig, shutdown: Shutdown) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(DrainState::Active as u8)),
            in_flight,
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
            started: Shutdown::new(),
            shutdown,
            fleet: None,
            deregistration: None,
        }
    }

    /// Also drain the whole fleet when this node drains (master).
    pub fn with_fleet(mut self, fleet: FleetDrain) -> Self {
        self.fleet = Some(fleet);
        self
    }

    /// Leave the master's ring when this node drains (worker).
    pub fn with_deregistration(mut self, deregistration: Deregistration) -> Self {
        self.deregistration = Some(deregistration);
        self
    }

    /// Resolves once draining has started.
    pub fn draining_signal(&self) -> ShutdownSignal {
        self.started.subscribe()
    }

    pub fn state(&self) -> DrainState {
        DrainState::from(self.state.load(Ordering::SeqCst))
    }

    /// True once drain has started; new data-plane work must be refused.
    pub fn is_draining(&self) -> bool {
        self.state() != DrainState::Active
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Flip to draining. Returns false if drain had already started.
    pub fn begin(&self) -> bool {
        let started = self
            .state
            .compare_exchange(
                DrainState::Active as u8,
                DrainState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if started {
            self.started.trigger();
        }
        started
    }

    /// Start draining in the background. Returns false if already draining.
    pub fn trigger(&self) -> bool {
        if !self.begin() {
            tracing::debug!("Drain already in progress");
            return false;
        }
        tracing::info!(in_flight = self.in_flight.count(), "Drain started");

        let this = self.clone();
        tokio::spawn(async move {
            this.finish().await;
        });
        true
    }

    /// Rest of the drain after [`begin`](Self::begin): leave the ring,
    /// fleet broadcast, wait, shutdown.
    pub async fn finish(&self) -> DrainOutcome {
        if let Some(deregistration) = &self.deregistration {
            deregistration.notify().await;
        }
        if let Some(fleet) = &self.fleet {
            fleet.broadcast().await;
        }

        let outcome = self.wait_idle().await;
        match outcome {
            DrainOutcome::Idle => tracing::info!("In-flight requests finished, shutting down"),
            DrainOutcome::TimedOut { remaining } => {
                tracing::warn!(remaining, "Drain timed out, shutting down with requests in flight")
            }
        }
        self.shutdown.trigger();
        outcome
    }

    /// Poll the in-flight counter until it reads zero or the timeout passes.
    ///
    /// The first poll happens immediately.
    pub async fn wait_idle(&self) -> DrainOutcome {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            ticker.tick().await;
            let remaining = self.in_flight.count();
            if remaining == 0 {
                break DrainOutcome::Idle;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break DrainOutcome::TimedOut { remaining };
            }
            tracing::debug!(remaining, "Waiting for in-flight requests");
        };

        self.state
            .store(DrainState::Terminated as u8, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::monitor::tests::FakeMembers;

    fn controller(poll_ms: u64, timeout_secs: Option<u64>) -> (DrainController, Shutdown) {
        let shutdown = Shutdown::new();
        let config = DrainConfig {
            poll_interval_ms: poll_ms,
            timeout_secs,
            ..DrainConfig::default()
        };
        (
            DrainController::new(InFlight::new(), &config, shutdown.clone()),
            shutdown,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_node_exits_on_first_poll() {
        let (drain, shutdown) = controller(1000, None);
        let start = Instant::now();

        assert!(drain.begin());
        assert_eq!(drain.finish().await, DrainOutcome::Idle);
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert!(shutdown.is_triggered());
        assert_eq!(drain.state(), DrainState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_in_flight() {
        let (drain, shutdown) = controller(1000, None);
        let start = Instant::now();

        for hold_ms in [1500, 3200] {
            let guard = drain.in_flight().track();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(hold_ms)).await;
                drop(guard);
            });
        }

        assert!(drain.begin());
        assert!(drain.is_draining());
        assert_eq!(drain.wait_idle().await, DrainOutcome::Idle);

        // exits on the first poll after the last request ends
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3200), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(4500), "{:?}", elapsed);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_wait() {
        let (drain, shutdown) = controller(1000, Some(5));
        let _stuck = drain.in_flight().track();

        assert!(drain.begin());
        let outcome = drain.finish().await;
        assert_eq!(outcome, DrainOutcome::TimedOut { remaining: 1 });
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_only_once() {
        let (drain, shutdown) = controller(10, None);
        let mut signal = shutdown.subscribe();

        assert!(drain.trigger());
        assert!(!drain.trigger());
        assert!(!drain.begin());

        time::timeout(Duration::from_secs(2), signal.wait())
            .await
            .expect("idle drain should shut down");
    }

    #[tokio::test]
    async fn test_draining_signal_fires_on_begin() {
        let (drain, _shutdown) = controller(10, None);
        let mut signal = drain.draining_signal();
        let waiter = tokio::spawn(async move { signal.wait().await });

        assert!(drain.begin());
        time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("draining signal should fire")
            .unwrap();

        // late subscribers see it too
        let mut late = drain.draining_signal();
        time::timeout(Duration::from_secs(1), late.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn test_fleet_broadcast_evicts_every_member() {
        let registry = Arc::new(WorkerRegistry::new(50));
        let a: WorkerAddr = "127.0.0.1:5001".parse().unwrap();
        let b: WorkerAddr = "127.0.0.1:5002".parse().unwrap();
        registry.register(a.clone());
        registry.register(b.clone());

        let members = Arc::new(FakeMembers::default());
        let fleet = FleetDrain::new(registry.clone(), members.clone(), 3);
        let (drain, shutdown) = controller(10, None);
        let drain = drain.with_fleet(fleet);

        assert!(drain.begin());
        assert_eq!(drain.finish().await, DrainOutcome::Idle);

        let mut drained = members.drained();
        drained.sort();
        assert_eq!(drained, vec![a, b]);
        assert!(registry.is_empty());
        assert!(shutdown.is_triggered());
    }
}
